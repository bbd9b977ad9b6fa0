use super::{SessionWhitelist, TokenIssuer};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use serde_json::value::RawValue;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub lock_ttl: Duration,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
    /// Must stay below `lock_ttl`.
    pub response_ttl: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        RefreshSettings {
            lock_ttl: Duration::from_secs(25),
            retry_attempts: 25,
            retry_backoff: Duration::from_millis(1000),
            response_ttl: Duration::from_secs(20),
        }
    }
}

/// Serializes rotations of the same refresh request across processes.
///
/// Requests are keyed by a fingerprint of their body. The first one to take
/// the store lock rotates the token and caches the reply; duplicates that
/// arrive while the cache entry lives get that reply byte for byte.
pub struct RefreshCoordinator {
    store: Arc<dyn WhitelistStore>,
    keys: KeySpace,
    codec: Arc<dyn TokenCodec>,
    issuer: Arc<TokenIssuer>,
    whitelist: Arc<SessionWhitelist>,
    settings: RefreshSettings,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn WhitelistStore>,
        keys: KeySpace,
        codec: Arc<dyn TokenCodec>,
        issuer: Arc<TokenIssuer>,
        whitelist: Arc<SessionWhitelist>,
        settings: RefreshSettings,
    ) -> Self {
        RefreshCoordinator {
            store,
            keys,
            codec,
            issuer,
            whitelist,
            settings,
        }
    }

    pub async fn refresh(&self, request: &RefreshRequest) -> Result<RefreshReply, AuthError> {
        let fingerprint = RequestFingerprint::of(request)
            .map_err(|e| AuthError::InternalError(format!("fingerprint: {e}")))?;
        let lock_key = self.keys.refresh_lock(&fingerprint);
        let holder = uuid::Uuid::new_v4().to_string();

        self.acquire(&lock_key, &holder).await?;
        let result = self.refresh_locked(&fingerprint, request).await;
        self.release(&lock_key, &holder).await;
        result
    }

    async fn acquire(&self, lock_key: &str, holder: &str) -> Result<(), AuthError> {
        let attempts = self.settings.retry_attempts.max(1);
        let mut store_failures = 0;
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self
                .store
                .set_if_absent(lock_key, holder, self.settings.lock_ttl)
                .await
            {
                Ok(true) => {
                    debug!(lock_key, attempt, "refresh lock acquired");
                    return Ok(());
                }
                Ok(false) => debug!(lock_key, attempt, "refresh lock held elsewhere"),
                Err(e) => {
                    store_failures += 1;
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.settings.retry_backoff).await;
            }
        }

        match last_error {
            Some(e) if store_failures == attempts => Err(AuthError::StoreUnavailable(e)),
            _ => {
                warn!(lock_key, attempts, "refresh lock not acquired");
                Err(AuthError::Busy)
            }
        }
    }

    async fn release(&self, lock_key: &str, holder: &str) {
        match self.store.compare_and_delete(lock_key, holder).await {
            Ok(true) => debug!(lock_key, "refresh lock released"),
            Ok(false) => warn!(lock_key, "refresh lock expired before release"),
            Err(e) => error!(lock_key, error = %e, "refresh lock release failed"),
        }
    }

    /// Runs with the lock held: cache check, verification, rotation.
    async fn refresh_locked(
        &self,
        fingerprint: &RequestFingerprint,
        request: &RefreshRequest,
    ) -> Result<RefreshReply, AuthError> {
        let cache_key = self.keys.refresh_response(fingerprint);

        if let Some(cached) = self.store.get(&cache_key).await? {
            debug!(%cache_key, "replaying cached refresh response");
            let body = RawValue::from_string(cached)
                .map_err(|e| AuthError::InternalError(format!("cached refresh payload: {e}")))?;
            return Ok(RefreshReply {
                body,
                replayed: true,
            });
        }

        let claims = self
            .codec
            .verify_refresh_token(&RefreshToken(request.refresh_token.clone()))
            .await
            .inspect_err(|e| debug!(error = %e, "refresh token rejected"))?;

        if !self.whitelist.take(&claims.token_id).await? {
            info!(token_id = %claims.token_id, "refresh token not whitelisted");
            return Err(AuthError::TokenRevoked);
        }

        let tokens = match self.issuer.issue(claims.user_id, &claims.roles).await {
            Ok(tokens) => tokens,
            Err(AuthError::StoreUnavailable(e)) => {
                error!(
                    user_id = %claims.user_id,
                    token_id = %claims.token_id,
                    error = %e,
                    "old session revoked but new one not registered"
                );
                return Err(AuthError::RotationIncomplete(e));
            }
            Err(e) => return Err(e),
        };

        let response = RefreshResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user_id: claims.user_id,
        };
        let payload = serde_json::to_string(&response)
            .map_err(|e| AuthError::InternalError(format!("refresh payload: {e}")))?;

        match self
            .store
            .set_if_absent(&cache_key, &payload, self.settings.response_ttl)
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(%cache_key, "refresh response already cached"),
            Err(e) => error!(%cache_key, error = %e, "refresh response not cached"),
        }

        info!(
            user_id = %claims.user_id,
            old_token_id = %claims.token_id,
            new_token_id = %tokens.token_id,
            "rotated refresh token"
        );
        let body = RawValue::from_string(payload)
            .map_err(|e| AuthError::InternalError(format!("refresh payload: {e}")))?;
        Ok(RefreshReply {
            body,
            replayed: false,
        })
    }
}
