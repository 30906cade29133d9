use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use super::StateStore;

/// In-memory record store. Backs integration tests and local development
/// where no database is available; not durable across restarts.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        Ok(self.records.get(key).map(|v| v.clone()))
    }

    async fn save(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        self.records.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn purge(&self, key: &str) -> anyhow::Result<()> {
        self.records.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn save_load_purge_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.load("monitor:alice").await.unwrap().is_none());

        store
            .save("monitor:alice", &json!({"version": 2}))
            .await
            .unwrap();
        let loaded = store.load("monitor:alice").await.unwrap().unwrap();
        assert_eq!(loaded["version"], 2);

        store.purge("monitor:alice").await.unwrap();
        assert!(store.load("monitor:alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn purge_missing_key_is_ok() {
        let store = MemoryStore::new();
        store.purge("monitor:nobody").await.unwrap();
    }
}
