use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{DocumentStore, DuplicateGroup};
use crate::config::StoreConfig;
use crate::error::{MigrationError, Result};
use crate::types::FinalRecord;

const MEMORY_URI: &str = "sqlite::memory:";

/// Document store on top of SQLite. Each collection is a table of JSON
/// documents; queries go through SQLite's JSON functions.
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
    table: String,
    location: String,
}

impl SqliteStore {
    pub fn open(config: &StoreConfig) -> Result<Self> {
        validate_identifier(&config.collection)?;

        if config.uri == MEMORY_URI {
            let conn = Connection::open_in_memory()
                .map_err(|e| connectivity(MEMORY_URI, e))?;
            return Self::init(conn, &config.collection, MEMORY_URI.to_string());
        }

        let dir = config.uri.strip_prefix("sqlite://").ok_or_else(|| {
            MigrationError::Config(format!("Unsupported SQLite URI '{}'", config.uri))
        })?;
        validate_identifier(&config.database)?;
        let db_path = PathBuf::from(dir)
            .join(format!("{}.sqlite3", config.database));
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| connectivity(&config.uri, e))?;
        }

        let location = db_path.display().to_string();
        info!("Opening SQLite document store at {}", location);
        let conn = Connection::open(&db_path)
            .map_err(|e| connectivity(&location, e))?;
        Self::init(conn, &config.collection, location)
    }

    fn init(conn: Connection, collection: &str, location: String) -> Result<Self> {
        conn.execute_batch(&format!(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS "{collection}" (
                id   TEXT PRIMARY KEY,
                body TEXT NOT NULL
            );
            "#
        ))
        .map_err(|e| connectivity(&location, e))?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            table: collection.to_string(),
            location,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| MigrationError::Store("connection lock poisoned".to_string()))
    }

    /// Run `f` against the open connection
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        let conn = guard.as_mut().ok_or_else(|| MigrationError::Connectivity {
            uri: self.location.clone(),
            reason: "connection is closed".to_string(),
        })?;
        Ok(f(conn)?)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn location(&self) -> String {
        self.location.clone()
    }

    async fn ping(&self) -> Result<()> {
        self.with_conn(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .map(|_| ())
            .map_err(|e| match e {
                MigrationError::Sqlite(e) => connectivity(&self.location, e),
                other => other,
            })
    }

    async fn clear(&self) -> Result<u64> {
        let sql = format!(r#"DELETE FROM "{}""#, self.table);
        let removed = self.with_conn(|conn| conn.execute(&sql, []))?;
        debug!("Cleared {} documents from {}", removed, self.table);
        Ok(removed as u64)
    }

    async fn insert_batch(&self, records: &[FinalRecord]) -> Result<usize> {
        let count = records.len();
        let rejected = |reason: String| MigrationError::BatchInsert { count, reason };

        let bodies = records
            .iter()
            .map(serde_json::to_string)
            .collect::<serde_json::Result<Vec<_>>>()
            .map_err(|e| rejected(e.to_string()))?;

        let sql = format!(
            r#"INSERT INTO "{}" (id, body) VALUES (?1, ?2)"#,
            self.table
        );
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(&sql)?;
                for body in &bodies {
                    stmt.execute(params![Uuid::new_v4().to_string(), body])?;
                }
            }
            tx.commit()
        })
        .map_err(|e| match e {
            MigrationError::Sqlite(e) => rejected(e.to_string()),
            other => other,
        })?;

        Ok(count)
    }

    async fn count_documents(&self) -> Result<u64> {
        let sql = format!(r#"SELECT COUNT(*) FROM "{}""#, self.table);
        let count = self.with_conn(|conn| conn.query_row(&sql, [], |row| row.get::<_, i64>(0)))?;
        Ok(count as u64)
    }

    async fn find_one(&self) -> Result<Option<Value>> {
        let sql = format!(
            r#"SELECT id, body FROM "{}" ORDER BY rowid LIMIT 1"#,
            self.table
        );
        let row = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            if let Some(row) = rows.next()? {
                let id: String = row.get(0)?;
                let body: String = row.get(1)?;
                Ok(Some((id, body)))
            } else {
                Ok(None)
            }
        })?;

        match row {
            Some((id, body)) => {
                let mut document: Value = serde_json::from_str(&body)?;
                if let Value::Object(map) = &mut document {
                    map.insert("_id".to_string(), Value::String(id));
                }
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    async fn count_blank(&self, field: &str) -> Result<u64> {
        let sql = format!(
            r#"SELECT COUNT(*) FROM "{}"
               WHERE json_extract(body, ?1) IS NULL OR json_extract(body, ?1) = ''"#,
            self.table
        );
        let path = json_path(field);
        let count =
            self.with_conn(|conn| conn.query_row(&sql, params![path], |row| row.get::<_, i64>(0)))?;
        Ok(count as u64)
    }

    async fn duplicate_groups(&self, fields: &[&str]) -> Result<Vec<DuplicateGroup>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let extracts: Vec<String> = (1..=fields.len())
            .map(|i| format!("json_extract(body, ?{i})"))
            .collect();
        let sql = format!(
            r#"SELECT json_array({}) AS group_key, COUNT(*) AS n
               FROM "{}" GROUP BY group_key HAVING n > 1"#,
            extracts.join(", "),
            self.table
        );
        let paths: Vec<String> = fields.iter().map(|f| json_path(f)).collect();

        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mapped = stmt.query_map(params_from_iter(paths.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            mapped.collect::<rusqlite::Result<Vec<_>>>()
        })?;

        rows.into_iter()
            .map(|(values, count)| -> Result<DuplicateGroup> {
                let values: Vec<Value> = serde_json::from_str(&values)?;
                let key = fields
                    .iter()
                    .map(|f| f.to_string())
                    .zip(values)
                    .collect::<serde_json::Map<_, _>>();
                Ok(DuplicateGroup {
                    key: Value::Object(key),
                    count: count as u64,
                })
            })
            .collect()
    }

    fn close(&self) {
        let conn = match self.conn.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => {
                warn!("Connection lock poisoned while closing {}", self.location);
                return;
            }
        };
        if let Some(conn) = conn {
            if let Err((_, e)) = conn.close() {
                warn!("Error while closing SQLite connection {}: {}", self.location, e);
            } else {
                debug!("Closed SQLite connection {}", self.location);
            }
        }
    }
}

fn connectivity(location: &str, e: impl std::fmt::Display) -> MigrationError {
    MigrationError::Connectivity {
        uri: location.to_string(),
        reason: e.to_string(),
    }
}

/// Collection and database names end up in SQL and file names
fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(MigrationError::Config(format!(
            "'{name}' is not a valid database or collection name"
        )))
    }
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}
