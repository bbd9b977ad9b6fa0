use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

const FETCH_BATCH: usize = 100;

/// Whitelist of live sessions, one entry per token type and token id.
///
/// Entry values are the owning user id; the store TTL mirrors the token
/// lifetime so an entry never outlives its token.
pub struct SessionWhitelist {
    store: Arc<dyn WhitelistStore>,
    keys: KeySpace,
}

impl SessionWhitelist {
    pub fn new(store: Arc<dyn WhitelistStore>, keys: KeySpace) -> Self {
        SessionWhitelist { store, keys }
    }

    fn ttl_until(until: DateTime<Utc>) -> Duration {
        let secs = (until - Utc::now()).num_seconds();
        Duration::from_secs(secs.max(1) as u64)
    }

    /// Registers both tokens of a pair in one atomic write.
    pub async fn register(&self, user_id: UserId, tokens: &IssuedTokens) -> Result<(), StoreError> {
        let owner = user_id.to_string();
        let entries = [
            StoreEntry {
                key: self
                    .keys
                    .whitelist_entry(TokenType::Access, &tokens.token_id),
                value: owner.clone(),
                ttl: Self::ttl_until(tokens.access_token_expires_at),
            },
            StoreEntry {
                key: self
                    .keys
                    .whitelist_entry(TokenType::Refresh, &tokens.token_id),
                value: owner,
                ttl: Self::ttl_until(tokens.refresh_token_expires_at),
            },
        ];
        self.store.set_many(&entries).await?;
        debug!(%user_id, token_id = %tokens.token_id, "registered session");
        Ok(())
    }

    pub async fn contains(
        &self,
        token_type: TokenType,
        token_id: &TokenId,
    ) -> Result<bool, StoreError> {
        let key = self.keys.whitelist_entry(token_type, token_id);
        Ok(self.store.get(&key).await?.is_some())
    }

    /// Removes both entries of a pair. Returns how many were present.
    pub async fn revoke(&self, token_id: &TokenId) -> Result<u64, StoreError> {
        let keys = [
            self.keys.whitelist_entry(TokenType::Access, token_id),
            self.keys.whitelist_entry(TokenType::Refresh, token_id),
        ];
        let removed = self.store.delete(&keys).await?;
        debug!(%token_id, removed, "revoked session");
        Ok(removed)
    }

    /// Consumes a session for rotation. The refresh entry is deleted first and
    /// its delete count is the membership test, so a concurrent revocation
    /// leaves nothing to consume. Returns false when the entry was gone.
    pub async fn take(&self, token_id: &TokenId) -> Result<bool, StoreError> {
        let refresh_key = self.keys.whitelist_entry(TokenType::Refresh, token_id);
        if self.store.delete(std::slice::from_ref(&refresh_key)).await? == 0 {
            return Ok(false);
        }
        let access_key = self.keys.whitelist_entry(TokenType::Access, token_id);
        self.store.delete(std::slice::from_ref(&access_key)).await?;
        debug!(%token_id, "consumed session");
        Ok(true)
    }

    /// Removes every entry owned by `user_id`.
    ///
    /// Walks the whole whitelist namespace, so cost grows with the number of
    /// live sessions across all users.
    pub async fn revoke_all_for(&self, user_id: UserId) -> Result<u64, StoreError> {
        let owner = user_id.to_string();
        let candidates = self.store.scan(&self.keys.whitelist_pattern()).await?;

        let mut owned = Vec::new();
        for batch in candidates.chunks(FETCH_BATCH) {
            let values = self.store.get_many(batch).await?;
            owned.extend(
                batch
                    .iter()
                    .zip(values)
                    .filter(|(_, value)| value.as_deref() == Some(owner.as_str()))
                    .map(|(key, _)| key.clone()),
            );
        }

        let removed = self.store.delete(&owned).await?;
        info!(
            %user_id,
            scanned = candidates.len(),
            removed,
            "revoked all sessions"
        );
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::MemoryWhitelistStore;
    use chrono::TimeDelta;

    fn pair(token_id: &str) -> IssuedTokens {
        let now = Utc::now();
        IssuedTokens {
            token_id: TokenId(token_id.to_string()),
            access_token: AccessToken("a".to_string()),
            refresh_token: RefreshToken("r".to_string()),
            access_token_expires_at: now + TimeDelta::seconds(60),
            refresh_token_expires_at: now + TimeDelta::seconds(600),
        }
    }

    fn whitelist() -> (Arc<MemoryWhitelistStore>, SessionWhitelist) {
        let store = Arc::new(MemoryWhitelistStore::new());
        let whitelist = SessionWhitelist::new(store.clone(), KeySpace::new("test"));
        (store, whitelist)
    }

    #[tokio::test]
    async fn register_writes_both_namespaces() {
        let (store, whitelist) = whitelist();
        let user_id = UserId::new_v4();
        let tokens = pair("t-1");
        whitelist.register(user_id, &tokens).await.unwrap();

        assert!(whitelist.contains(TokenType::Access, &tokens.token_id).await.unwrap());
        assert!(whitelist.contains(TokenType::Refresh, &tokens.token_id).await.unwrap());
        let owner = store.get("test:whitelist:refresh:t-1").await.unwrap();
        assert_eq!(owner, Some(user_id.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn access_entry_expires_with_the_access_token() {
        let (_, whitelist) = whitelist();
        let tokens = pair("t-1");
        whitelist.register(UserId::new_v4(), &tokens).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!whitelist.contains(TokenType::Access, &tokens.token_id).await.unwrap());
        assert!(whitelist.contains(TokenType::Refresh, &tokens.token_id).await.unwrap());
    }

    #[tokio::test]
    async fn revoke_all_only_touches_the_owner() {
        let (_, whitelist) = whitelist();
        let alice = UserId::new_v4();
        let bob = UserId::new_v4();
        for id in ["a-1", "a-2", "a-3"] {
            whitelist.register(alice, &pair(id)).await.unwrap();
        }
        whitelist.register(bob, &pair("b-1")).await.unwrap();

        assert_eq!(whitelist.revoke_all_for(alice).await.unwrap(), 6);
        for id in ["a-1", "a-2", "a-3"] {
            let id = TokenId(id.to_string());
            assert!(!whitelist.contains(TokenType::Access, &id).await.unwrap());
            assert!(!whitelist.contains(TokenType::Refresh, &id).await.unwrap());
        }
        let bob_token = TokenId("b-1".to_string());
        assert!(whitelist.contains(TokenType::Refresh, &bob_token).await.unwrap());
        assert_eq!(whitelist.revoke_all_for(alice).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn revoke_reports_missing_entries() {
        let (_, whitelist) = whitelist();
        let tokens = pair("t-1");
        whitelist.register(UserId::new_v4(), &tokens).await.unwrap();
        assert_eq!(whitelist.revoke(&tokens.token_id).await.unwrap(), 2);
        assert_eq!(whitelist.revoke(&tokens.token_id).await.unwrap(), 0);
    }
}
