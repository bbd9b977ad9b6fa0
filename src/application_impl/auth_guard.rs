use super::SessionWhitelist;
use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use std::sync::Arc;

const BEARER: &str = "Bearer ";

/// Admits a request only with a live, whitelisted access token.
pub struct AuthGuard {
    codec: Arc<dyn TokenCodec>,
    whitelist: Arc<SessionWhitelist>,
}

impl AuthGuard {
    pub fn new(codec: Arc<dyn TokenCodec>, whitelist: Arc<SessionWhitelist>) -> Self {
        AuthGuard { codec, whitelist }
    }

    fn bearer_token(authorization: Option<&str>) -> Option<&str> {
        let value = authorization?.trim();
        let prefix = value.get(..BEARER.len())?;
        if !prefix.eq_ignore_ascii_case(BEARER) {
            return None;
        }
        let token = value[BEARER.len()..].trim();
        (!token.is_empty()).then_some(token)
    }

    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<AuthContext, AuthError> {
        let token = Self::bearer_token(authorization).ok_or(AuthError::MissingBearer)?;

        let claims = self
            .codec
            .verify_access_token(&AccessToken(token.to_string()))
            .await
            .inspect_err(|e| debug!(error = %e, "access token rejected"))?;

        if !self
            .whitelist
            .contains(TokenType::Access, &claims.token_id)
            .await?
        {
            debug!(token_id = %claims.token_id, "access token not whitelisted");
            return Err(AuthError::TokenRevoked);
        }

        Ok(AuthContext {
            user_id: claims.user_id,
            roles: claims.roles,
            token_id: claims.token_id,
        })
    }
}
