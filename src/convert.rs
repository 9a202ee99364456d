//! Conversions that run after deduplication: billing amount to an exact
//! decimal and admission/discharge dates to date-times.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::constants::{BILLING_AMOUNT, CURRENCY_SCALE, DATE_COLUMNS, DATE_FORMAT};
use crate::error::ConversionError;
use crate::types::{DocumentValue, FinalRecord, NormalizedRecord};

/// Parse a monetary amount and round it half away from zero to two places.
/// The result always carries exactly two fraction digits.
pub fn parse_currency(raw: &str) -> Result<Decimal, ConversionError> {
    let trimmed = raw.trim();
    let amount = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| ConversionError::InvalidAmount {
            value: raw.to_string(),
            reason: e.to_string(),
        })?;

    let mut rounded =
        amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(CURRENCY_SCALE);
    Ok(rounded)
}

/// Parse a `YYYY-MM-DD` date into midnight of that day.
///
/// The year must start with a digit: chrono alone would also take leading
/// whitespace or a signed year.
pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDateTime, ConversionError> {
    let invalid = |reason: String| ConversionError::InvalidDate {
        field: field.to_string(),
        value: raw.to_string(),
        reason,
    };

    if !raw.as_bytes().first().is_some_and(u8::is_ascii_digit) {
        return Err(invalid("year must start with a digit".to_string()));
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|e| invalid(e.to_string()))
}

fn required_text<'a>(
    record: &'a NormalizedRecord,
    field: &str,
) -> Result<&'a str, ConversionError> {
    record
        .text(field)
        .ok_or_else(|| ConversionError::MissingField(field.to_string()))
}

/// Turn a deduplicated record into its stored form.
pub fn finalize_record(record: &NormalizedRecord) -> Result<FinalRecord, ConversionError> {
    let amount = parse_currency(required_text(record, BILLING_AMOUNT)?)?;
    let mut dates = Vec::with_capacity(DATE_COLUMNS.len());
    for field in DATE_COLUMNS {
        dates.push((field, parse_date(field, required_text(record, field)?)?));
    }

    let fields = record
        .fields()
        .iter()
        .map(|(name, value)| {
            let converted = if name == BILLING_AMOUNT {
                DocumentValue::Decimal(amount)
            } else if let Some((_, date)) = dates.iter().find(|(field, _)| *field == name) {
                DocumentValue::DateTime(*date)
            } else {
                DocumentValue::from(value.clone())
            };
            (name.clone(), converted)
        })
        .collect();

    Ok(FinalRecord::new(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{AGE, DATE_OF_ADMISSION, DISCHARGE_DATE, NAME};
    use crate::types::FieldValue;

    fn record(amount: &str, admitted: &str, discharged: &str) -> NormalizedRecord {
        NormalizedRecord::new(vec![
            (NAME.to_string(), FieldValue::Text("Ann Lee".to_string())),
            (AGE.to_string(), FieldValue::Integer(33)),
            (
                DATE_OF_ADMISSION.to_string(),
                FieldValue::Text(admitted.to_string()),
            ),
            (
                BILLING_AMOUNT.to_string(),
                FieldValue::Text(amount.to_string()),
            ),
            (
                DISCHARGE_DATE.to_string(),
                FieldValue::Text(discharged.to_string()),
            ),
        ])
    }

    #[test]
    fn test_currency_rounds_half_away_from_zero() {
        assert_eq!(parse_currency("100.005").unwrap().to_string(), "100.01");
        assert_eq!(parse_currency("100.004").unwrap().to_string(), "100.00");
        assert_eq!(parse_currency("2.675").unwrap().to_string(), "2.68");
        assert_eq!(parse_currency("-1.005").unwrap().to_string(), "-1.01");
    }

    #[test]
    fn test_currency_pads_to_two_places() {
        assert_eq!(parse_currency("100").unwrap().to_string(), "100.00");
        assert_eq!(parse_currency(" 7.1 ").unwrap().to_string(), "7.10");
        assert_eq!(parse_currency("1.5e2").unwrap().to_string(), "150.00");
    }

    #[test]
    fn test_currency_rejects_garbage() {
        assert!(matches!(
            parse_currency("twelve"),
            Err(ConversionError::InvalidAmount { .. })
        ));
        assert!(parse_currency("").is_err());
    }

    #[test]
    fn test_parse_date_leap_years() {
        let leap = parse_date(DATE_OF_ADMISSION, "2024-02-29").unwrap();
        assert_eq!(leap.to_string(), "2024-02-29 00:00:00");

        let err = parse_date(DATE_OF_ADMISSION, "2023-02-29").unwrap_err();
        assert!(matches!(
            err,
            ConversionError::InvalidDate { ref field, .. } if field == DATE_OF_ADMISSION
        ));
    }

    #[test]
    fn test_parse_date_rejects_other_patterns() {
        assert!(parse_date(DISCHARGE_DATE, "02/03/2024").is_err());
        assert!(parse_date(DISCHARGE_DATE, "").is_err());
        assert!(parse_date(DISCHARGE_DATE, " 2024-02-05").is_err());
        assert!(parse_date(DISCHARGE_DATE, "+2024-02-05").is_err());
        assert!(parse_date(DISCHARGE_DATE, "-2024-02-05").is_err());
        assert!(parse_date(DISCHARGE_DATE, "2024-02-05 ").is_err());
    }

    #[test]
    fn test_parse_date_accepts_unpadded_month_and_day() {
        let date = parse_date(DISCHARGE_DATE, "2024-2-5").unwrap();
        assert_eq!(date.to_string(), "2024-02-05 00:00:00");
    }

    #[test]
    fn test_finalize_record() {
        let finalized = finalize_record(&record("100.005", "2024-02-29", "2024-03-02"))
            .unwrap();

        let names: Vec<&str> = finalized.field_names().collect();
        assert_eq!(
            names,
            vec![NAME, AGE, DATE_OF_ADMISSION, BILLING_AMOUNT, DISCHARGE_DATE]
        );
        assert_eq!(
            finalized.get(BILLING_AMOUNT),
            Some(&DocumentValue::Decimal(Decimal::from_str("100.01").unwrap()))
        );
        assert_eq!(finalized.get(AGE), Some(&DocumentValue::Integer(33)));

        let doc = finalized.to_document().unwrap();
        assert_eq!(doc[BILLING_AMOUNT], "100.01");
        assert_eq!(doc[DATE_OF_ADMISSION], "2024-02-29T00:00:00");
        assert_eq!(doc[DISCHARGE_DATE], "2024-03-02T00:00:00");
        assert_eq!(doc[AGE], 33);
        assert_eq!(doc[NAME], "Ann Lee");

        let keys: Vec<&str> = doc
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(
            keys,
            vec![NAME, AGE, DATE_OF_ADMISSION, BILLING_AMOUNT, DISCHARGE_DATE]
        );
    }

    #[test]
    fn test_finalize_record_fails_on_either_date() {
        let err = finalize_record(&record("10", "2024-01-01", "2023-02-29"))
            .unwrap_err();
        assert!(matches!(
            err,
            ConversionError::InvalidDate { ref field, .. } if field == DISCHARGE_DATE
        ));
    }

    #[test]
    fn test_finalize_record_requires_amount() {
        let record = NormalizedRecord::new(vec![(NAME.to_string(), FieldValue::Text("X".into()))]);
        assert_eq!(
            finalize_record(&record).unwrap_err(),
            ConversionError::MissingField(BILLING_AMOUNT.to_string())
        );
    }
}
