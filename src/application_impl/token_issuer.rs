use super::SessionWhitelist;
use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use std::sync::Arc;

pub struct TokenIssuer {
    codec: Arc<dyn TokenCodec>,
    whitelist: Arc<SessionWhitelist>,
}

impl TokenIssuer {
    pub fn new(codec: Arc<dyn TokenCodec>, whitelist: Arc<SessionWhitelist>) -> Self {
        TokenIssuer { codec, whitelist }
    }

    /// Mints a pair under a fresh token id and whitelists it.
    ///
    /// Nothing is returned unless the whitelist write succeeded.
    pub async fn issue(&self, user_id: UserId, roles: &[String]) -> Result<IssuedTokens, AuthError> {
        let token_id = TokenId::generate();

        let (access_token, access_token_expires_at) = self
            .codec
            .issue_access_token(user_id, roles, &token_id)
            .await?;
        let (refresh_token, refresh_token_expires_at) = self
            .codec
            .issue_refresh_token(user_id, roles, &token_id)
            .await?;

        let tokens = IssuedTokens {
            token_id,
            access_token,
            refresh_token,
            access_token_expires_at,
            refresh_token_expires_at,
        };
        self.whitelist.register(user_id, &tokens).await?;

        info!(%user_id, token_id = %tokens.token_id, "issued token pair");
        Ok(tokens)
    }
}
