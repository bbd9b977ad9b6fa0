use super::SessionWhitelist;
use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use std::sync::Arc;

pub struct SessionRevocation {
    codec: Arc<dyn TokenCodec>,
    whitelist: Arc<SessionWhitelist>,
}

impl SessionRevocation {
    pub fn new(codec: Arc<dyn TokenCodec>, whitelist: Arc<SessionWhitelist>) -> Self {
        SessionRevocation { codec, whitelist }
    }

    /// Ends one session. Never fails; the outcome says what happened.
    pub async fn logout(&self, refresh_token: Option<RefreshToken>) -> LogoutOutcome {
        let (outcome, token_id) = self.revoke_one(refresh_token).await;
        let code = outcome.code();
        let token_id = token_id.as_ref().map(TokenId::as_str).unwrap_or_default();
        match outcome {
            LogoutOutcome::Revoked => info!(code, token_id, "logout"),
            LogoutOutcome::SecretNotConfigured
            | LogoutOutcome::WhitelistUnavailable
            | LogoutOutcome::DeleteFailed => error!(code, token_id, "logout left session in place"),
            _ => warn!(code, token_id, "logout with unusable token"),
        }
        outcome
    }

    async fn revoke_one(
        &self,
        refresh_token: Option<RefreshToken>,
    ) -> (LogoutOutcome, Option<TokenId>) {
        let Some(token) = refresh_token.filter(|token| !token.0.is_empty()) else {
            return (LogoutOutcome::MissingToken, None);
        };

        let claims = match self.codec.verify_refresh_token(&token).await {
            Ok(claims) => claims,
            Err(TokenError::SecretNotConfigured) => {
                return (LogoutOutcome::SecretNotConfigured, None);
            }
            Err(TokenError::WrongType { .. }) => return (LogoutOutcome::NotRefreshToken, None),
            Err(TokenError::InvalidClaims(_)) => return (LogoutOutcome::InvalidClaims, None),
            Err(_) => return (LogoutOutcome::InvalidToken, None),
        };
        let token_id = claims.token_id;

        let outcome = match self.whitelist.contains(TokenType::Refresh, &token_id).await {
            Err(_) => LogoutOutcome::WhitelistUnavailable,
            Ok(false) => LogoutOutcome::NotInWhitelist,
            Ok(true) => match self.whitelist.revoke(&token_id).await {
                Ok(0) => LogoutOutcome::NotInWhitelist,
                Ok(_) => LogoutOutcome::Revoked,
                Err(_) => LogoutOutcome::DeleteFailed,
            },
        };
        (outcome, Some(token_id))
    }

    /// Ends every session of `user_id`, in both namespaces.
    pub async fn logout_all(&self, user_id: UserId) -> Result<LogoutAllResult, AuthError> {
        let revoked = self.whitelist.revoke_all_for(user_id).await?;
        Ok(LogoutAllResult { user_id, revoked })
    }
}
