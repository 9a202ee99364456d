use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{group_key, DocumentStore, DuplicateGroup};
use crate::error::{MigrationError, Result};
use crate::types::FinalRecord;

const LOCATION: &str = "memory://";

/// In-memory document store for dry runs and tests.
///
/// Records how often each write operation was called and can be told to
/// behave like an unreachable store or to reject batch inserts.
pub struct InMemoryStore {
    documents: Mutex<Vec<Value>>,
    reachable: bool,
    reject_inserts: bool,
    closed: AtomicBool,
    ping_calls: AtomicUsize,
    clear_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(Vec::new()),
            reachable: true,
            reject_inserts: false,
            closed: AtomicBool::new(false),
            ping_calls: AtomicUsize::new(0),
            clear_calls: AtomicUsize::new(0),
            insert_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// Every ping fails with a connectivity error
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    /// Every batch insert is rejected
    pub fn rejecting_inserts(mut self) -> Self {
        self.reject_inserts = true;
        self
    }

    /// Start with these documents already stored
    pub fn with_documents(mut self, documents: Vec<Value>) -> Self {
        if let Ok(stored) = self.documents.get_mut() {
            stored.extend(documents);
        }
        self
    }

    /// Copy of everything currently stored
    pub fn documents(&self) -> Vec<Value> {
        self.documents.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn ping_calls(&self) -> usize {
        self.ping_calls.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.reachable {
            return Err(MigrationError::Connectivity {
                uri: LOCATION.to_string(),
                reason: "store is unreachable".to_string(),
            });
        }
        if self.is_closed() {
            return Err(MigrationError::Connectivity {
                uri: LOCATION.to_string(),
                reason: "connection is closed".to_string(),
            });
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Value>>> {
        self.documents
            .lock()
            .map_err(|_| MigrationError::Store("document lock poisoned".to_string()))
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn location(&self) -> String {
        LOCATION.to_string()
    }

    async fn ping(&self) -> Result<()> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()
    }

    async fn clear(&self) -> Result<u64> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;
        let mut documents = self.lock()?;
        let removed = documents.len() as u64;
        documents.clear();
        debug!("Cleared {} documents", removed);
        Ok(removed)
    }

    async fn insert_batch(&self, records: &[FinalRecord]) -> Result<usize> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;
        if self.reject_inserts {
            return Err(MigrationError::BatchInsert {
                count: records.len(),
                reason: "insert rejected by store".to_string(),
            });
        }

        let mut batch = Vec::with_capacity(records.len());
        for record in records {
            let mut document = record
                .to_document()
                .map_err(|e| MigrationError::BatchInsert {
                    count: records.len(),
                    reason: e.to_string(),
                })?;
            if let Value::Object(map) = &mut document {
                map.insert(
                    "_id".to_string(),
                    Value::String(Uuid::new_v4().to_string()),
                );
            }
            batch.push(document);
        }

        let mut documents = self.lock()?;
        documents.extend(batch);
        Ok(records.len())
    }

    async fn count_documents(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.lock()?.len() as u64)
    }

    async fn find_one(&self) -> Result<Option<Value>> {
        self.ensure_open()?;
        Ok(self.lock()?.first().cloned())
    }

    async fn count_blank(&self, field: &str) -> Result<u64> {
        self.ensure_open()?;
        let documents = self.lock()?;
        let blank = documents
            .iter()
            .filter(|doc| match doc.get(field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            })
            .count();
        Ok(blank as u64)
    }

    async fn duplicate_groups(&self, fields: &[&str]) -> Result<Vec<DuplicateGroup>> {
        self.ensure_open()?;
        let documents = self.lock()?;
        let mut groups: BTreeMap<String, DuplicateGroup> = BTreeMap::new();
        for doc in documents.iter() {
            let key = group_key(doc, fields);
            groups
                .entry(key.to_string())
                .or_insert_with(|| DuplicateGroup { key, count: 0 })
                .count += 1;
        }
        Ok(groups.into_values().filter(|g| g.count > 1).collect())
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("In-memory store closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let store = InMemoryStore::new()
            .with_documents(vec![json!({"Name": "A"})]);
        assert_eq!(store.clear().await.unwrap(), 1);
        assert_eq!(store.clear().await.unwrap(), 0);
        assert_eq!(store.clear_calls(), 2);
    }

    #[tokio::test]
    async fn test_queries() {
        let store = InMemoryStore::new().with_documents(vec![
            json!({"Name": "A", "Age": 1}),
            json!({"Name": "", "Age": 1}),
            json!({"Age": 2}),
            json!({"Name": "A", "Age": 1}),
        ]);

        assert_eq!(store.count_documents().await.unwrap(), 4);
        assert_eq!(
            store.find_one().await.unwrap(),
            Some(json!({"Name": "A", "Age": 1}))
        );
        assert_eq!(store.count_blank("Name").await.unwrap(), 2);

        let groups = store.duplicate_groups(&["Name", "Age"]).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].key, json!({"Name": "A", "Age": 1}));
    }

    #[tokio::test]
    async fn test_closed_store_refuses_work() {
        let store = InMemoryStore::new();
        store.close();
        store.close();
        assert!(store.is_closed());
        assert_eq!(store.close_calls(), 2);
        assert!(matches!(
            store.insert_batch(&[]).await,
            Err(MigrationError::Connectivity { .. })
        ));
    }
}
