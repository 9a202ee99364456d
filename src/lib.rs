pub mod config;
pub mod constants;
pub mod convert;
pub mod dedup;
pub mod error;
pub mod integrity;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod source;
pub mod storage;
pub mod types;

pub use config::{ConfigOverrides, MigrationConfig, StoreConfig};
pub use error::{ConversionError, MigrationError, Result};
pub use integrity::{IntegrityChecker, IntegrityReport};
pub use pipeline::{FailedRun, MigrationReport, Pipeline, RunState};
pub use storage::{open_store, wait_until_ready, DocumentStore, InMemoryStore, SqliteStore};
