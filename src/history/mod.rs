//! Persisted history of past analyses.
//!
//! The [`HistoryStore`] trait is the only way the rest of the crate touches
//! history. Records are appended and deleted by id; they are never updated
//! in place. Listing returns insertion order.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryHistoryStore;
pub use sqlite::SqliteHistoryStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::HistoryRecord;

/// Key under which the JSON-encoded record list is persisted.
pub const HISTORY_KEY: &str = "textSleuth_history";

/// Abstract history backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list`](HistoryStore::list) | All records, in insertion order |
/// | [`append`](HistoryStore::append) | Add a new record at the end |
/// | [`get`](HistoryStore::get) | Look up a record by id |
/// | [`delete`](HistoryStore::delete) | Remove a record by id |
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn list(&self) -> Result<Vec<HistoryRecord>>;

    async fn append(&self, record: HistoryRecord) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<HistoryRecord>> {
        Ok(self.list().await?.into_iter().find(|r| r.id == id))
    }

    /// Returns `true` if a record with `id` existed and was removed.
    async fn delete(&self, id: &str) -> Result<bool>;
}
