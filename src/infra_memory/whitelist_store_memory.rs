use crate::domain_port::*;
use crate::logger::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryEntry {
    fn new(value: &str, ttl: Duration) -> Self {
        MemoryEntry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Single-process stand-in for the shared store.
///
/// Expired entries are invisible to every read and are purged lazily or by
/// the optional sweeper task. Uses the tokio clock so paused-time tests can
/// drive expiry.
#[derive(Debug, Default)]
pub struct MemoryWhitelistStore {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryWhitelistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn_sweeper(
        self: &Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let removed = store.purge_expired();
                        if removed > 0 {
                            debug!(removed, "purged expired store entries");
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        })
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    fn live_value(&self, key: &str, now: Instant) -> Option<String> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }
}

#[async_trait::async_trait]
impl WhitelistStore for MemoryWhitelistStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.entries
            .insert(key.to_string(), MemoryEntry::new(value, ttl));
        Ok(())
    }

    async fn set_many(&self, entries: &[StoreEntry]) -> Result<(), StoreError> {
        for entry in entries {
            self.entries.insert(
                entry.key.clone(),
                MemoryEntry::new(&entry.value, entry.ttl),
            );
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.live_value(key, Instant::now()))
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        let now = Instant::now();
        Ok(keys.iter().map(|key| self.live_value(key, now)).collect())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut removed = 0;
        for key in keys {
            if let Some((_, entry)) = self.entries.remove(key) {
                if entry.is_live(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    Ok(false)
                } else {
                    occupied.insert(MemoryEntry::new(value, ttl));
                    Ok(true)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(MemoryEntry::new(value, ttl));
                Ok(true)
            }
        }
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let removed = self
            .entries
            .remove_if(key, |_, entry| entry.is_live(now) && entry.value == expected);
        Ok(removed.is_some())
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|item| item.value().is_live(now) && glob_match(pattern, item.key()))
            .map(|item| item.key().clone())
            .collect())
    }
}

/// `*`-only glob, enough for the prefix patterns this service scans with.
fn glob_match(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return key.is_empty();
    };
    let Some(mut rest) = key.strip_prefix(first) else {
        return false;
    };
    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matches_prefix_and_infix_patterns() {
        assert!(glob_match("dorm:whitelist:*", "dorm:whitelist:refresh:1"));
        assert!(!glob_match("dorm:whitelist:*", "dorm:refresh_lock:1"));
        assert!(glob_match("a*c*e", "abcde"));
        assert!(!glob_match("a*c*e", "abcd"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = MemoryWhitelistStore::new();
        store.set("k", "v", Duration::from_secs(5)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.scan("*").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn set_if_absent_excludes_until_expiry() {
        let store = MemoryWhitelistStore::new();
        let ttl = Duration::from_secs(10);
        assert!(store.set_if_absent("lock", "a", ttl).await.unwrap());
        assert!(!store.set_if_absent("lock", "b", ttl).await.unwrap());

        tokio::time::advance(ttl).await;
        assert!(store.set_if_absent("lock", "b", ttl).await.unwrap());
        assert_eq!(store.get("lock").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn compare_and_delete_only_removes_own_value() {
        let store = MemoryWhitelistStore::new();
        let ttl = Duration::from_secs(10);
        store.set("lock", "holder-a", ttl).await.unwrap();

        assert!(!store.compare_and_delete("lock", "holder-b").await.unwrap());
        assert!(store.get("lock").await.unwrap().is_some());
        assert!(store.compare_and_delete("lock", "holder-a").await.unwrap());
        assert!(store.get("lock").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_counts_existing_keys() {
        let store = MemoryWhitelistStore::new();
        let ttl = Duration::from_secs(10);
        store
            .set_many(&[
                StoreEntry {
                    key: "a".to_string(),
                    value: "1".to_string(),
                    ttl,
                },
                StoreEntry {
                    key: "b".to_string(),
                    value: "2".to_string(),
                    ttl,
                },
            ])
            .await
            .unwrap();

        let values = store
            .get_many(&["a".to_string(), "missing".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(
            values,
            vec![Some("1".to_string()), None, Some("2".to_string())]
        );

        let removed = store
            .delete(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_expired_entries() {
        let store = Arc::new(MemoryWhitelistStore::new());
        store.set("k", "v", Duration::from_secs(1)).await.unwrap();

        let cancel = CancellationToken::new();
        let handle = store.spawn_sweeper(Duration::from_secs(2), cancel.clone());
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(store.entries.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }
}
