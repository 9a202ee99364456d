/// Column names of the patient dataset.
/// These are the exact header names expected in the input file and the field
/// names of every stored document.
pub const NAME: &str = "Name";
pub const AGE: &str = "Age";
pub const GENDER: &str = "Gender";
pub const BLOOD_TYPE: &str = "Blood Type";
pub const MEDICAL_CONDITION: &str = "Medical Condition";
pub const DATE_OF_ADMISSION: &str = "Date of Admission";
pub const DOCTOR: &str = "Doctor";
pub const HOSPITAL: &str = "Hospital";
pub const INSURANCE_PROVIDER: &str = "Insurance Provider";
pub const BILLING_AMOUNT: &str = "Billing Amount";
pub const ROOM_NUMBER: &str = "Room Number";
pub const ADMISSION_TYPE: &str = "Admission Type";
pub const DISCHARGE_DATE: &str = "Discharge Date";
pub const MEDICATION: &str = "Medication";
pub const TEST_RESULTS: &str = "Test Results";

/// Every column the input must carry, in dataset order
pub const REQUIRED_COLUMNS: [&str; 15] = [
    NAME,
    AGE,
    GENDER,
    BLOOD_TYPE,
    MEDICAL_CONDITION,
    DATE_OF_ADMISSION,
    DOCTOR,
    HOSPITAL,
    INSURANCE_PROVIDER,
    BILLING_AMOUNT,
    ROOM_NUMBER,
    ADMISSION_TYPE,
    DISCHARGE_DATE,
    MEDICATION,
    TEST_RESULTS,
];

/// Text columns that get title casing (Name has its own cleaning rule)
pub const TITLE_CASED_COLUMNS: [&str; 8] = [
    GENDER,
    MEDICAL_CONDITION,
    ADMISSION_TYPE,
    MEDICATION,
    TEST_RESULTS,
    DOCTOR,
    HOSPITAL,
    INSURANCE_PROVIDER,
];

/// Columns converted to date-times after deduplication
pub const DATE_COLUMNS: [&str; 2] = [DATE_OF_ADMISSION, DISCHARGE_DATE];

/// Source date pattern
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fraction digits kept on the billing amount
pub const CURRENCY_SCALE: u32 = 2;

// Environment variables
pub const ENV_INPUT_CSV_FILE: &str = "INPUT_CSV_FILE";
pub const ENV_DB_NAME: &str = "DB_NAME";
pub const ENV_COLLECTION_NAME: &str = "COLLECTION_NAME";
pub const ENV_STORE_URI: &str = "STORE_URI";
pub const ENV_WAIT_TIMEOUT_SECS: &str = "STORE_WAIT_TIMEOUT_SECS";
pub const ENV_CONFIG_FILE: &str = "PATIENT_LOADER_CONFIG";

// Defaults
pub const DEFAULT_INPUT_CSV_FILE: &str = "healthcare_dataset.csv";
pub const DEFAULT_DB_NAME: &str = "healthcare";
pub const DEFAULT_COLLECTION_NAME: &str = "patients";
pub const DEFAULT_STORE_URI: &str = "sqlite://data";
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_WAIT_INTERVAL_SECS: u64 = 2;
pub const DEFAULT_LOG_DIR: &str = "logs";
