//! Process-local store, used when the database cannot be opened.

use arin_core::{PersistenceError, Progress, ProgressStore, COUNT_KEY, ENDED_KEY};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw string value, as if written by an earlier run.
    pub async fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
    }

    pub async fn get_raw(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn load(&self) -> Result<Progress, PersistenceError> {
        let entries = self.entries.read().await;
        Ok(Progress::decode(
            entries.get(COUNT_KEY).map(String::as_str),
            entries.get(ENDED_KEY).map(String::as_str),
        ))
    }

    async fn save(&self, progress: Progress) -> Result<(), PersistenceError> {
        let (count, ended) = progress.encode();
        let mut entries = self.entries.write().await;
        entries.insert(COUNT_KEY.to_string(), count);
        entries.insert(ENDED_KEY.to_string(), ended);
        Ok(())
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        let mut entries = self.entries.write().await;
        entries.remove(COUNT_KEY);
        entries.remove(ENDED_KEY);
        Ok(())
    }
}
