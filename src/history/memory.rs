//! In-memory [`HistoryStore`], for tests and for embedders without a database.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::HistoryRecord;

use super::HistoryStore;

pub struct MemoryHistoryStore {
    records: RwLock<Vec<HistoryRecord>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("history lock poisoned")
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn list(&self) -> Result<Vec<HistoryRecord>> {
        Ok(self.records.read().map_err(poisoned)?.clone())
    }

    async fn append(&self, record: HistoryRecord) -> Result<()> {
        self.records.write().map_err(poisoned)?.push(record);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut records = self.records.write().map_err(poisoned)?;
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }
}
