use std::fmt::Display;
use std::time::Duration;

/// A key/value write with its own time-to-live.
#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub key: String,
    pub value: String,
    pub ttl: Duration,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("store {op} failed for key {key}: {message}")]
pub struct StoreError {
    pub op: &'static str,
    pub key: String,
    pub message: String,
}

impl StoreError {
    pub fn new(op: &'static str, key: impl Into<String>, error: impl Display) -> Self {
        StoreError {
            op,
            key: key.into(),
            message: error.to_string(),
        }
    }
}

/// TTL-capable key/value store shared by every server process.
///
/// Each call is one atomic operation at the store boundary. Callers must
/// treat any error as transient and surface it, never as "key absent".
#[async_trait::async_trait]
pub trait WhitelistStore: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Write all entries or none.
    async fn set_many(&self, entries: &[StoreEntry]) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Values in the same order as `keys`.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError>;

    /// Returns how many of `keys` existed.
    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError>;

    /// Create-if-absent. `true` when this call wrote the key.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
    -> Result<bool, StoreError>;

    /// Delete `key` only while it still holds `expected`.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// All live keys matching a glob `pattern`, walked with a cursor.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError>;
}
