use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use indexmap::IndexMap;
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use super::{RecordStore, UpsertAction};
use crate::error::StoreError;
use crate::normalize::normalize;
use crate::record::{NormalizedRecord, RawPairs};

/// Local snapshot of the last scraped record per ISO code.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

pub struct StoredRecord {
    pub iso_code: String,
    pub fields: IndexMap<String, String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct SnapshotStats {
    pub records: usize,
    pub fields: usize,
    pub oldest_update: Option<String>,
    pub newest_update: Option<String>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| StoreError::Unexpected(format!("cannot create {:?}: {}", dir, e)))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS guideline_records (
                iso_code   TEXT PRIMARY KEY,
                fields     TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unexpected("sqlite connection lock poisoned".into()))
    }

    /// Insert or merge. Runs synchronously; rusqlite has no async API.
    pub fn upsert_blocking(&self, iso_code: &str, record: &NormalizedRecord) -> Result<UpsertAction, StoreError> {
        let conn = self.lock()?;
        let now = chrono::Utc::now().to_rfc3339();
        let tx = conn.unchecked_transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT fields FROM guideline_records WHERE iso_code = ?1",
                [iso_code],
                |row| row.get(0),
            )
            .optional()?;

        let action = match existing {
            Some(json) => {
                let mut fields: RawPairs = serde_json::from_str::<IndexMap<String, String>>(&json)?
                    .into_iter()
                    .collect();
                for (key, value) in record.iter() {
                    fields.insert(key, value);
                }
                // keys new to this ISO code must land in their canonical slot
                let merged = normalize(&fields);
                tx.execute(
                    "UPDATE guideline_records SET fields = ?1, updated_at = ?2 WHERE iso_code = ?3",
                    rusqlite::params![serde_json::to_string(&merged)?, now, iso_code],
                )?;
                UpsertAction::Updated(iso_code.to_string())
            }
            None => {
                tx.execute(
                    "INSERT INTO guideline_records (iso_code, fields, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?3)",
                    rusqlite::params![iso_code, serde_json::to_string(record)?, now],
                )?;
                UpsertAction::Created(iso_code.to_string())
            }
        };

        tx.commit()?;
        Ok(action)
    }

    pub fn get(&self, iso_code: &str) -> Result<Option<StoredRecord>, StoreError> {
        let conn = self.lock()?;
        let row: Option<(String, String, String, String)> = conn
            .query_row(
                "SELECT iso_code, fields, created_at, updated_at
                 FROM guideline_records WHERE iso_code = ?1",
                [iso_code],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        row.map(|(iso_code, json, created_at, updated_at)| {
            Ok::<_, StoreError>(StoredRecord {
                iso_code,
                fields: serde_json::from_str(&json)?,
                created_at,
                updated_at,
            })
        })
        .transpose()
    }

    /// Every stored record, ordered by ISO code.
    pub fn all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT iso_code, fields, created_at, updated_at
             FROM guideline_records ORDER BY iso_code",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (iso_code, json, created_at, updated_at) = row?;
            records.push(StoredRecord {
                iso_code,
                fields: serde_json::from_str(&json)?,
                created_at,
                updated_at,
            });
        }
        Ok(records)
    }

    pub fn stats(&self) -> Result<SnapshotStats, StoreError> {
        let conn = self.lock()?;
        let (records, oldest_update, newest_update): (usize, Option<String>, Option<String>) = conn
            .query_row(
                "SELECT COUNT(*), MIN(updated_at), MAX(updated_at) FROM guideline_records",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )?;

        let mut stmt = conn.prepare("SELECT fields FROM guideline_records")?;
        let mut fields = 0;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for json in rows {
            let map: IndexMap<String, String> = serde_json::from_str(&json?)?;
            fields += map.len();
        }

        Ok(SnapshotStats {
            records,
            fields,
            oldest_update,
            newest_update,
        })
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn upsert(&self, iso_code: &str, record: &NormalizedRecord) -> Result<UpsertAction, StoreError> {
        let action = self.upsert_blocking(iso_code, record)?;
        match &action {
            UpsertAction::Created(_) => info!("Created snapshot for ISO code {}", iso_code),
            UpsertAction::Updated(_) => info!("Updated snapshot for ISO code {}", iso_code),
        }
        Ok(action)
    }
}

// ── Tests ──
