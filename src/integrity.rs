//! Post-load acceptance checks against the store.

use serde::Serialize;
use tracing::{info, warn};

use crate::constants::{NAME, REQUIRED_COLUMNS};
use crate::error::Result;
use crate::storage::DocumentStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

impl CheckOutcome {
    fn new(name: &'static str, passed: bool, detail: String) -> Self {
        if passed {
            info!("{} passed: {}", name, detail);
        } else {
            warn!("{} failed: {}", name, detail);
        }
        Self {
            name,
            passed,
            detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityReport {
    pub checks: Vec<CheckOutcome>,
}

impl IntegrityReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

pub struct IntegrityChecker<'a> {
    store: &'a dyn DocumentStore,
    expected_fields: Vec<&'static str>,
}

impl<'a> IntegrityChecker<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            expected_fields: REQUIRED_COLUMNS.to_vec(),
        }
    }

    /// Run every check. Store errors abort; failed checks are reported.
    pub async fn run(&self) -> Result<IntegrityReport> {
        info!("Starting data integrity checks on {}", self.store.location());
        let checks = vec![
            self.check_not_empty().await?,
            self.check_fields_present().await?,
            self.check_names_present().await?,
            self.check_no_duplicates().await?,
        ];
        Ok(IntegrityReport { checks })
    }

    async fn check_not_empty(&self) -> Result<CheckOutcome> {
        let count = self.store.count_documents().await?;
        Ok(CheckOutcome::new(
            "document count",
            count > 0,
            format!("found {count} documents"),
        ))
    }

    async fn check_fields_present(&self) -> Result<CheckOutcome> {
        let outcome = match self.store.find_one().await? {
            None => CheckOutcome::new(
                "field presence",
                false,
                "no sample document available".to_string(),
            ),
            Some(sample) => {
                let missing: Vec<&str> = self
                    .expected_fields
                    .iter()
                    .copied()
                    .filter(|field| sample.get(*field).is_none())
                    .collect();
                if missing.is_empty() {
                    CheckOutcome::new(
                        "field presence",
                        true,
                        "all expected fields are present in a sample document".to_string(),
                    )
                } else {
                    CheckOutcome::new(
                        "field presence",
                        false,
                        format!("missing fields: {}", missing.join(", ")),
                    )
                }
            }
        };
        Ok(outcome)
    }

    async fn check_names_present(&self) -> Result<CheckOutcome> {
        let blank = self.store.count_blank(NAME).await?;
        Ok(CheckOutcome::new(
            "non-empty names",
            blank == 0,
            format!("{blank} documents with a null or empty {NAME}"),
        ))
    }

    async fn check_no_duplicates(&self) -> Result<CheckOutcome> {
        let groups = self.store.duplicate_groups(&self.expected_fields).await?;
        Ok(CheckOutcome::new(
            "no duplicates",
            groups.is_empty(),
            format!("{} groups of duplicate documents", groups.len()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use serde_json::{json, Value};

    fn patient(name: &str, room: i64) -> Value {
        let mut doc = serde_json::Map::new();
        for field in REQUIRED_COLUMNS {
            doc.insert(field.to_string(), json!("x"));
        }
        doc.insert(NAME.to_string(), json!(name));
        doc.insert("Room Number".to_string(), json!(room.to_string()));
        Value::Object(doc)
    }

    #[tokio::test]
    async fn test_clean_collection_passes() {
        let store = InMemoryStore::new()
            .with_documents(vec![patient("Ann", 1), patient("Bob", 2)]);
        let report = IntegrityChecker::new(&store).run().await.unwrap();
        assert!(report.passed(), "{report:?}");
        assert_eq!(report.checks.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_collection_fails_count_and_fields() {
        let store = InMemoryStore::new();
        let report = IntegrityChecker::new(&store).run().await.unwrap();
        let failed: Vec<&str> = report.failures().map(|c| c.name).collect();
        assert_eq!(failed, vec!["document count", "field presence"]);
    }

    #[tokio::test]
    async fn test_detects_blank_names_missing_fields_and_duplicates() {
        let mut partial = patient("Cy", 3);
        partial.as_object_mut().unwrap().remove("Medication");
        let store = InMemoryStore::new().with_documents(vec![
            partial,
            patient("", 1),
            patient("Ann", 2),
            patient("Ann", 2),
        ]);

        let report = IntegrityChecker::new(&store).run().await.unwrap();
        assert!(!report.passed());
        let failed: Vec<&str> = report.failures().map(|c| c.name).collect();
        assert_eq!(
            failed,
            vec!["field presence", "non-empty names", "no duplicates"]
        );
        assert!(report.checks[1].detail.contains("Medication"));
    }
}
