use metrics::{counter, histogram};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::convert::finalize_record;
use crate::dedup::deduplicate_by;
use crate::error::{ConversionError, MigrationError, Result};
use crate::normalize::normalize_record;
use crate::source::{read_source, SourceRow};
use crate::storage::DocumentStore;
use crate::types::{FinalRecord, NormalizedRecord};

/// Stages of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    NotStarted,
    Connected,
    Cleared,
    Reading,
    Normalizing,
    Deduplicating,
    Converting,
    Inserting,
    Closed,
    Failed,
}

/// Where a row was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipStage {
    Normalization,
    Conversion,
}

impl fmt::Display for SkipStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipStage::Normalization => write!(f, "normalization"),
            SkipStage::Conversion => write!(f, "conversion"),
        }
    }
}

/// A row that was left out of the batch, with the reason
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowSkip {
    pub stage: SkipStage,
    pub line: u64,
    pub row: String,
    pub reason: String,
}

/// Counts and diagnostics of a completed run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    pub rows_read: usize,
    pub skipped_at_normalization: usize,
    pub duplicates_removed: usize,
    pub skipped_at_conversion: usize,
    pub inserted: usize,
    /// Documents removed by the initial clear
    pub cleared: u64,
    pub skips: Vec<RowSkip>,
    /// States visited, in order
    pub states: Vec<RunState>,
}

impl MigrationReport {
    fn new() -> Self {
        Self {
            rows_read: 0,
            skipped_at_normalization: 0,
            duplicates_removed: 0,
            skipped_at_conversion: 0,
            inserted: 0,
            cleared: 0,
            skips: Vec::new(),
            states: vec![RunState::NotStarted],
        }
    }

    /// Nothing survived to the insert stage
    pub fn is_empty(&self) -> bool {
        self.inserted == 0
    }

    fn advance(&mut self, next: RunState) {
        if let Some(current) = self.states.last() {
            debug!("Run state {:?} -> {:?}", current, next);
        }
        self.states.push(next);
    }

    fn skip(&mut self, stage: SkipStage, line: u64, row: String, reason: &ConversionError) {
        warn!(%stage, line, %row, %reason, "Skipping row");
        match stage {
            SkipStage::Normalization => self.skipped_at_normalization += 1,
            SkipStage::Conversion => self.skipped_at_conversion += 1,
        }
        self.skips.push(RowSkip {
            stage,
            line,
            row,
            reason: reason.to_string(),
        });
    }
}

/// A run that stopped on a fatal error, with everything counted up to that
/// point. The last entry of `report.states` is [`RunState::Failed`].
#[derive(Error, Debug)]
#[error("{error}")]
pub struct FailedRun {
    #[source]
    pub error: MigrationError,
    pub report: Box<MigrationReport>,
}

/// Closes the store on every exit path of a run
struct StoreSession<'a> {
    store: &'a dyn DocumentStore,
}

impl Drop for StoreSession<'_> {
    fn drop(&mut self) {
        self.store.close();
        info!("Store connection to {} closed", self.store.location());
    }
}

/// Load the patient dataset at `input_path` into a document store.
pub struct Pipeline {
    input_path: PathBuf,
}

impl Pipeline {
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
        }
    }

    /// Run the whole migration. The store is closed before this returns,
    /// whether the run succeeded or not.
    #[instrument(
        skip(self, store),
        fields(input = %self.input_path.display(), store = %store.location())
    )]
    pub async fn run(
        &self,
        store: &dyn DocumentStore,
    ) -> std::result::Result<MigrationReport, FailedRun> {
        info!("Starting the migration process...");
        counter!("patient_loader_runs_total").increment(1);
        let started = Instant::now();

        let mut report = MigrationReport::new();
        let outcome = {
            let _session = StoreSession { store };
            self.execute(store, &mut report).await
        };
        histogram!("patient_loader_run_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(()) => {
                report.advance(RunState::Closed);
                Ok(report)
            }
            Err(error) => {
                report.advance(RunState::Failed);
                error!("Migration failed after {:?}: {}", report.states, error);
                counter!("patient_loader_failed_runs_total").increment(1);
                Err(FailedRun {
                    error,
                    report: Box::new(report),
                })
            }
        }
    }

    async fn execute(
        &self,
        store: &dyn DocumentStore,
        report: &mut MigrationReport,
    ) -> Result<()> {
        store.ping().await?;
        report.advance(RunState::Connected);
        info!("Successfully connected to store at {}", store.location());

        info!("Clearing existing documents from the collection...");
        report.cleared = store.clear().await?;
        report.advance(RunState::Cleared);
        info!("Removed {} existing documents", report.cleared);

        report.advance(RunState::Reading);
        let rows = read_source(&self.input_path)?;
        report.rows_read = rows.len();
        counter!("patient_loader_rows_read_total")
            .increment(rows.len() as u64);
        info!("Read {} rows from {}", rows.len(), self.input_path.display());

        report.advance(RunState::Normalizing);
        let normalized = Self::normalize_rows(rows, report);
        counter!("patient_loader_rows_skipped_total", "stage" => "normalization")
            .increment(report.skipped_at_normalization as u64);
        info!(
            "Normalized {} rows ({} skipped)",
            normalized.len(),
            report.skipped_at_normalization
        );

        report.advance(RunState::Deduplicating);
        let deduplicated = deduplicate_by(normalized, |(_, record)| record);
        report.duplicates_removed = deduplicated.removed;
        counter!("patient_loader_duplicates_removed_total")
            .increment(deduplicated.removed as u64);
        info!("Removed {} duplicate rows", deduplicated.removed);

        report.advance(RunState::Converting);
        let batch = Self::finalize_rows(deduplicated.unique, report);
        counter!("patient_loader_rows_skipped_total", "stage" => "conversion")
            .increment(report.skipped_at_conversion as u64);
        info!(
            "Converted {} rows ({} skipped)",
            batch.len(),
            report.skipped_at_conversion
        );

        if batch.is_empty() {
            warn!("No data to insert");
            return Ok(());
        }

        report.advance(RunState::Inserting);
        report.inserted = store.insert_batch(&batch).await?;
        counter!("patient_loader_rows_inserted_total")
            .increment(report.inserted as u64);
        info!(
            "Successfully inserted {} unique documents into the collection",
            report.inserted
        );
        Ok(())
    }

    fn normalize_rows(
        rows: Vec<SourceRow>,
        report: &mut MigrationReport,
    ) -> Vec<(u64, NormalizedRecord)> {
        let mut normalized = Vec::with_capacity(rows.len());
        for row in rows {
            let result = row.record.and_then(|raw| normalize_record(&raw));
            match result {
                Ok(record) => normalized.push((row.line, record)),
                Err(e) => report.skip(SkipStage::Normalization, row.line, row.text, &e),
            }
        }
        normalized
    }

    fn finalize_rows(
        rows: Vec<(u64, NormalizedRecord)>,
        report: &mut MigrationReport,
    ) -> Vec<FinalRecord> {
        let mut batch = Vec::with_capacity(rows.len());
        for (line, record) in rows {
            match finalize_record(&record) {
                Ok(finalized) => batch.push(finalized),
                Err(e) => report.skip(SkipStage::Conversion, line, record.to_string(), &e),
            }
        }
        batch
    }
}
