pub mod airtable;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::NormalizedRecord;

pub use airtable::AirtableStore;
pub use sqlite::SqliteStore;

/// What an upsert did, carrying the datastore's id for the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertAction {
    Created(String),
    Updated(String),
}

/// Keyed record store.
///
/// `upsert` looks up the entry whose `ISO code` equals `iso_code`; if one
/// exists every field present in `record` overwrites the stored value,
/// otherwise a new entry is created.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn upsert(&self, iso_code: &str, record: &NormalizedRecord) -> Result<UpsertAction, StoreError>;
}
