use crate::domain_port::*;
use crate::logger::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::time::Duration;

const COMPARE_AND_DELETE: &str = include_str!("compare_and_delete.lua");
const SCAN_BATCH: usize = 100;

pub struct RedisWhitelistStore {
    conn: ConnectionManager,
}

impl RedisWhitelistStore {
    pub fn new(conn: ConnectionManager) -> Self {
        RedisWhitelistStore { conn }
    }

    /// Opens a managed connection and pings it once.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| StoreError::new("open", url, e))?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::new("connect", url, e))?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::new("ping", url, e))?;
        info!(%pong, "connected to redis");
        Ok(Self::new(conn))
    }

    // EX takes whole seconds; fractional TTLs round up.
    fn ttl_secs(ttl: Duration) -> u64 {
        (ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0)).max(1)
    }

    fn fail(op: &'static str, key: &str, error: redis::RedisError) -> StoreError {
        error!(op, key, %error, "redis call failed");
        StoreError::new(op, key, error)
    }
}

#[async_trait::async_trait]
impl WhitelistStore for RedisWhitelistStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, value, Self::ttl_secs(ttl))
            .await
            .map_err(|e| Self::fail("set", key, e))?;
        debug!(key, ttl_secs = ttl.as_secs(), "stored key");
        Ok(())
    }

    async fn set_many(&self, entries: &[StoreEntry]) -> Result<(), StoreError> {
        let Some(first) = entries.first() else {
            return Ok(());
        };
        let mut pipe = redis::pipe();
        pipe.atomic();
        for entry in entries {
            pipe.set_ex(&entry.key, &entry.value, Self::ttl_secs(entry.ttl))
                .ignore();
        }
        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::fail("set_many", &first.key, e))?;
        debug!(count = entries.len(), "stored keys atomically");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.map_err(|e| Self::fail("get", key, e))?;
        Ok(value)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        let Some(first) = keys.first() else {
            return Ok(Vec::new());
        };
        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::fail("get_many", first, e))?;
        Ok(values)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        let Some(first) = keys.first() else {
            return Ok(0);
        };
        let mut conn = self.conn.clone();
        let removed: u64 = conn
            .del(keys)
            .await
            .map_err(|e| Self::fail("delete", first, e))?;
        debug!(requested = keys.len(), removed, "deleted keys");
        Ok(removed)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(Self::ttl_secs(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::fail("set_if_absent", key, e))?;
        Ok(reply.is_some())
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let script = Script::new(COMPARE_AND_DELETE);
        let removed: i64 = script
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Self::fail("compare_and_delete", key, e))?;
        Ok(removed == 1)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let mut found = Vec::new();
        let mut cursor = 0u64;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| Self::fail("scan", pattern, e))?;
            found.extend(keys);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        // SCAN may return a key more than once across pages.
        found.sort_unstable();
        found.dedup();
        Ok(found)
    }
}
