pub mod memory;
pub mod postgres;

use async_trait::async_trait;

/// Durable key → versioned-JSON record storage.
/// Implementations: PgStore (JSONB rows in Postgres), MemoryStore (tests).
///
/// Every stored value carries its own `version` field; callers run an
/// explicit migration on load rather than relying on default-merging.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the record stored under `key`, if any.
    async fn load(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>>;

    /// Insert or replace the record stored under `key`.
    async fn save(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()>;

    /// Delete the record stored under `key`. Missing keys are not an error.
    async fn purge(&self, key: &str) -> anyhow::Result<()>;
}

/// Key for the per-creator monitor record.
pub fn monitor_key(creator: &str) -> String {
    format!("monitor:{creator}")
}

/// Key for the process-wide shared platform token.
pub const TOKEN_KEY: &str = "token:platform";
