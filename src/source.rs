use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use csv::{ByteRecord, StringRecord};
use tracing::{debug, info};

use crate::constants::REQUIRED_COLUMNS;
use crate::error::{ConversionError, MigrationError, Result};
use crate::types::RawRecord;

/// A data row together with the line it came from. Rows the reader could not
/// decode carry the reason instead of a record.
#[derive(Debug, Clone)]
pub struct SourceRow {
    pub line: u64,
    /// The row as it appeared in the file, fields joined with commas
    pub text: String,
    pub record: std::result::Result<RawRecord, ConversionError>,
}

/// Read every row of a delimited file with a header line.
///
/// The file is open only for the duration of this call.
pub fn read_source(path: &Path) -> Result<Vec<SourceRow>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => MigrationError::SourceNotFound(path.to_path_buf()),
        _ => MigrationError::Io(e),
    })?;
    info!("Reading rows from {}", path.display());
    read_rows(file)
}

/// Same as [`read_source`] over any reader.
pub fn read_rows<R: Read>(input: R) -> Result<Vec<SourceRow>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);

    let headers = reader.headers()?.clone();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|h| h == **column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(MigrationError::MissingColumns(missing));
    }

    let mut rows = Vec::new();
    let mut record = ByteRecord::new();
    while reader.read_byte_record(&mut record)? {
        // header is line 1
        let line = record
            .position()
            .map_or(rows.len() as u64 + 2, |p| p.line());
        let text = record
            .iter()
            .map(String::from_utf8_lossy)
            .collect::<Vec<_>>()
            .join(",");
        let decoded = decode_row(&headers, &record);
        if let Err(e) = &decoded {
            debug!("Undecodable row at line {}: {}", line, e);
        }
        rows.push(SourceRow {
            line,
            text,
            record: decoded,
        });
    }

    Ok(rows)
}

fn decode_row(
    headers: &StringRecord,
    record: &ByteRecord,
) -> std::result::Result<RawRecord, ConversionError> {
    if record.len() != headers.len() {
        return Err(ConversionError::MalformedRow(format!(
            "expected {} fields, found {}",
            headers.len(),
            record.len()
        )));
    }

    let fields = headers
        .iter()
        .zip(record.iter())
        .map(|(name, value)| {
            std::str::from_utf8(value)
                .map(|value| (name.to_string(), value.to_string()))
                .map_err(|e| {
                    ConversionError::MalformedRow(format!("{name} is not valid UTF-8: {e}"))
                })
        })
        .collect::<std::result::Result<Vec<_>, ConversionError>>()?;
    Ok(RawRecord::new(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{AGE, NAME};

    const HEADER: &str = "Name,Age,Gender,Blood Type,Medical Condition,Date of Admission,Doctor,Hospital,Insurance Provider,Billing Amount,Room Number,Admission Type,Discharge Date,Medication,Test Results";

    #[test]
    fn test_reads_rows_in_order_with_line_numbers() {
        let input = format!(
            "{HEADER}\n\
             Bobby Jackson,30,Male,B-,Cancer,2024-01-31,Matthew Smith,Sons and Miller,Blue Cross,18856.28,328,Urgent,2024-02-02,Paracetamol,Normal\n\
             Leslie Terry,62,Male,A+,Obesity,2019-08-20,Samantha Davies,Kim Inc,Medicare,33643.32,265,Emergency,2019-08-26,Ibuprofen,Inconclusive\n"
        );
        let rows = read_rows(input.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].line, 3);
        let first = rows[0].record.as_ref().unwrap();
        assert_eq!(first.get(NAME), Some("Bobby Jackson"));
        assert_eq!(first.get(AGE), Some("30"));
        assert_eq!(first.fields().len(), REQUIRED_COLUMNS.len());
    }

    #[test]
    fn test_missing_columns_are_fatal() {
        let input = "Name,Age\nBob,3\n";
        match read_rows(input.as_bytes()) {
            Err(MigrationError::MissingColumns(missing)) => {
                assert_eq!(missing.len(), REQUIRED_COLUMNS.len() - 2);
                assert!(missing.contains(&"Billing Amount".to_string()));
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_short_row_is_reported_not_fatal() {
        let input = format!(
            "{HEADER}\n\
             Bob,30\n\
             Ann,40,Female,O+,Asthma,2020-01-01,Doc,Hosp,Aetna,10.00,101,Elective,2020-01-02,Aspirin,Normal\n"
        );
        let rows = read_rows(input.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert!(matches!(
            rows[0].record,
            Err(ConversionError::MalformedRow(_))
        ));
        assert_eq!(rows[0].text, "Bob,30");
        assert_eq!(rows[0].line, 2);
        assert!(rows[1].record.is_ok());
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn test_invalid_utf8_row_keeps_lossy_text() {
        let row: &[u8] =
            b"Bo\xffb,30,Male,B-,Cancer,2024-01-31,Doc,Hosp,Aetna,1.00,1,Urgent,2024-02-02,Aspirin,Normal\n";
        let mut input = format!("{HEADER}\n").into_bytes();
        input.extend_from_slice(row);

        let rows = read_rows(input.as_slice()).unwrap();

        assert_eq!(rows.len(), 1);
        match &rows[0].record {
            Err(ConversionError::MalformedRow(reason)) => assert!(reason.contains("Name")),
            other => panic!("expected MalformedRow, got {other:?}"),
        }
        assert!(rows[0].text.starts_with("Bo\u{FFFD}b,30,Male"));
    }

    #[test]
    fn test_header_only_yields_no_rows() {
        let rows = read_rows(format!("{HEADER}\n").as_bytes()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = read_source(Path::new("definitely/not/here.csv"))
            .unwrap_err();
        assert!(matches!(err, MigrationError::SourceNotFound(_)));
    }
}
