//! In-process key-value store

use async_trait::async_trait;
use dashmap::DashMap;

use feed_core::{KeyValueStore, RepoResult};

/// Key-value store that lives as long as the process
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: DashMap<String, String>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> RepoResult<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> RepoResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}
