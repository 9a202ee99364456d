use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::StoreConfig;
use crate::error::{MigrationError, Result};
use crate::types::FinalRecord;

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// One group of identical documents found by [`DocumentStore::duplicate_groups`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    /// Field name to the shared value
    pub key: serde_json::Value,
    pub count: u64,
}

/// A document collection that receives the final batch and answers the
/// integrity queries.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Where the store lives, for log lines
    fn location(&self) -> String;

    /// Cheap round trip; fails with `Connectivity` when the store is unusable
    async fn ping(&self) -> Result<()>;

    /// Remove every document in the collection, returning how many went away
    async fn clear(&self) -> Result<u64>;

    /// Insert all records or none of them
    async fn insert_batch(&self, records: &[FinalRecord]) -> Result<usize>;

    async fn count_documents(&self) -> Result<u64>;

    /// Any single stored document
    async fn find_one(&self) -> Result<Option<serde_json::Value>>;

    /// Documents where `field` is missing, null or an empty string
    async fn count_blank(&self, field: &str) -> Result<u64>;

    /// Groups of documents sharing the same values for all `fields`, only
    /// groups with more than one member
    async fn duplicate_groups(&self, fields: &[&str]) -> Result<Vec<DuplicateGroup>>;

    /// Release the connection. Safe to call more than once.
    fn close(&self);
}

/// Open the store described by `config`.
///
/// Supported URIs: `sqlite://<dir>` (database file `<dir>/<database>.sqlite3`),
/// `sqlite::memory:` and `memory://` (nothing persisted).
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn DocumentStore>> {
    if config.uri.starts_with("memory://") {
        info!("Using in-memory document store, nothing will be persisted");
        return Ok(Box::new(InMemoryStore::new()));
    }
    if config.uri.starts_with("sqlite:") {
        return Ok(Box::new(SqliteStore::open(config)?));
    }
    Err(MigrationError::Config(format!(
        "Unsupported store URI '{}'",
        config.uri
    )))
}

/// Ping the store until it answers or `timeout` runs out.
pub async fn wait_until_ready(
    store: &dyn DocumentStore,
    timeout: Duration,
    interval: Duration,
) -> Result<()> {
    info!("Waiting for store at {} to be available...", store.location());
    let start = Instant::now();
    loop {
        match store.ping().await {
            Ok(()) => {
                info!("Store at {} is available", store.location());
                return Ok(());
            }
            Err(e) => {
                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    error!(
                        "Store at {} did not become available within {}s",
                        store.location(),
                        timeout.as_secs()
                    );
                    return Err(e);
                }
                warn!(
                    "Store not available yet, retrying in {}s ({}/{}s): {}",
                    interval.as_secs_f64(),
                    elapsed.as_secs(),
                    timeout.as_secs(),
                    e
                );
                tokio::time::sleep(interval).await;
            }
        }
    }
}

/// Key used to group documents on `fields`; absent fields group as null
pub(crate) fn group_key(document: &serde_json::Value, fields: &[&str]) -> serde_json::Value {
    let key: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|field| {
            (
                field.to_string(),
                document
                    .get(*field)
                    .cloned()
                    .unwrap_or(serde_json::Value::Null),
            )
        })
        .collect();
    serde_json::Value::Object(key)
}
