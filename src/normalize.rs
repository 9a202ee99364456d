//! Field-level cleaning of a single input row.
//!
//! Text columns get a canonical casing and `Age` becomes an integer. Billing
//! amount and dates stay as source strings until after deduplication.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{AGE, NAME, TITLE_CASED_COLUMNS};
use crate::error::ConversionError;
use crate::types::{FieldValue, NormalizedRecord, RawRecord};

static COURTESY_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(Mr\.|Mrs\.|Dr\.|Miss)\s*").expect("courtesy title pattern is valid")
});

/// Upper-case the first letter of each word and lower-case the rest.
///
/// A word starts at any cased letter that does not follow another cased
/// letter, so `o'neil` becomes `O'Neil` and `anne-marie` becomes `Anne-Marie`.
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_cased = false;
    for c in input.chars() {
        if prev_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_cased = c.is_lowercase() || c.is_uppercase();
    }
    out
}

/// Drop a leading courtesy title, trim, then title-case.
pub fn clean_name(raw: &str) -> String {
    let stripped = COURTESY_TITLE.replace(raw, "");
    title_case(stripped.trim())
}

pub fn parse_age(raw: &str) -> Result<i64, ConversionError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|e| ConversionError::InvalidAge {
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

/// Clean one raw row. Fails on the first field that cannot be converted.
pub fn normalize_record(raw: &RawRecord) -> Result<NormalizedRecord, ConversionError> {
    let fields = raw
        .fields()
        .iter()
        .map(|(name, value)| {
            let normalized = match name.as_str() {
                NAME => FieldValue::Text(clean_name(value)),
                AGE => FieldValue::Integer(parse_age(value)?),
                other if TITLE_CASED_COLUMNS.contains(&other) => {
                    FieldValue::Text(title_case(value))
                }
                _ => FieldValue::Text(value.clone()),
            };
            Ok((name.clone(), normalized))
        })
        .collect::<Result<Vec<_>, ConversionError>>()?;

    Ok(NormalizedRecord::new(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    fn sample_row(name: &str, age: &str) -> RawRecord {
        RawRecord::from_pairs([
            (NAME, name),
            (AGE, age),
            (GENDER, "male"),
            (BLOOD_TYPE, "A+"),
            (MEDICAL_CONDITION, "CANCER"),
            (DATE_OF_ADMISSION, "2024-01-31"),
            (DOCTOR, "matthew SMITH"),
            (HOSPITAL, "sons and miller"),
            (INSURANCE_PROVIDER, "blue cross"),
            (BILLING_AMOUNT, "18856.281305978155"),
            (ROOM_NUMBER, "328"),
            (ADMISSION_TYPE, "urgent"),
            (DISCHARGE_DATE, "2024-02-02"),
            (MEDICATION, "paracetamol"),
            (TEST_RESULTS, "normal"),
        ])
    }

    #[test]
    fn test_title_case_basic() {
        assert_eq!(title_case("bobby JACKSON"), "Bobby Jackson");
        assert_eq!(title_case("o'neil"), "O'Neil");
        assert_eq!(title_case("anne-marie"), "Anne-Marie");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_title_case_is_idempotent() {
        for input in ["hello WORLD", "  spaced   out ", "mcdonald's", "a+ b-", "ÉLODIE durand"] {
            let once = title_case(input);
            assert_eq!(title_case(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn test_clean_name_strips_every_courtesy_title() {
        for title in ["Mr.", "Mrs.", "Dr.", "Miss", "mr.", "MRS.", "dR.", "MISS"] {
            let raw = format!("{title} JOHN smith");
            assert_eq!(clean_name(&raw), "John Smith", "title {title:?}");
        }
    }

    #[test]
    fn test_clean_name_trims_and_keeps_untitled_names() {
        assert_eq!(clean_name("  leslie TERRY  "), "Leslie Terry");
        assert_eq!(clean_name("Dr.   danny smith"), "Danny Smith");
        // only a leading title is removed
        assert_eq!(clean_name("john dr. smith"), "John Dr. Smith");
    }

    #[test]
    fn test_parse_age() {
        assert_eq!(parse_age("30").unwrap(), 30);
        assert_eq!(parse_age(" 42 ").unwrap(), 42);
        assert!(matches!(parse_age("N/A"), Err(ConversionError::InvalidAge { .. })));
        assert!(parse_age("").is_err());
        assert!(parse_age("30.5").is_err());
    }

    #[test]
    fn test_normalize_record() {
        let normalized = normalize_record(&sample_row("mrs. jane DOE", "55"))
            .unwrap();

        assert_eq!(normalized.text(NAME), Some("Jane Doe"));
        assert_eq!(normalized.get(AGE), Some(&FieldValue::Integer(55)));
        assert_eq!(normalized.text(GENDER), Some("Male"));
        assert_eq!(normalized.text(DOCTOR), Some("Matthew Smith"));
        assert_eq!(normalized.text(HOSPITAL), Some("Sons And Miller"));
        assert_eq!(normalized.text(MEDICAL_CONDITION), Some("Cancer"));
        // untouched until after deduplication
        assert_eq!(normalized.text(BILLING_AMOUNT), Some("18856.281305978155"));
        assert_eq!(normalized.text(DATE_OF_ADMISSION), Some("2024-01-31"));
        assert_eq!(normalized.text(BLOOD_TYPE), Some("A+"));
    }

    #[test]
    fn test_normalize_record_keeps_field_order() {
        let raw = sample_row("Bob", "1");
        let names: Vec<String> = raw.fields().iter().map(|(k, _)| k.clone()).collect();
        let normalized = normalize_record(&raw).unwrap();
        let normalized_names: Vec<String> =
            normalized.fields().iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(names, normalized_names);
    }

    #[test]
    fn test_normalize_record_rejects_bad_age() {
        let err = normalize_record(&sample_row("Bob", "N/A")).unwrap_err();
        assert_eq!(
            err,
            ConversionError::InvalidAge {
                value: "N/A".to_string(),
                reason: "invalid digit found in string".to_string(),
            }
        );
    }
}
