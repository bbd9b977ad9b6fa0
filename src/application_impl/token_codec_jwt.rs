use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub signing_key: Vec<u8>,
}

#[derive(Debug, Serialize)]
struct SignedClaims<'a> {
    token_id: &'a str,
    user_id: String,
    roles: &'a [String],
    #[serde(rename = "type")]
    token_type: TokenType,
    exp: i64,
}

// Every field optional so a missing claim is reported as such instead of
// as a malformed token.
#[derive(Debug, Deserialize)]
struct RawClaims {
    token_id: Option<String>,
    user_id: Option<String>,
    roles: Option<Vec<String>>,
    #[serde(rename = "type")]
    token_type: Option<String>,
    exp: i64,
}

/// Signs with HS256 and accepts any HMAC variant on decode.
pub struct JwtHmacCodec {
    cfg: JwtConfig,
}

impl JwtHmacCodec {
    pub fn new(cfg: JwtConfig) -> Self {
        JwtHmacCodec { cfg }
    }

    fn key(&self) -> Result<&[u8], TokenError> {
        if self.cfg.signing_key.is_empty() {
            return Err(TokenError::SecretNotConfigured);
        }
        Ok(&self.cfg.signing_key)
    }

    fn validation() -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        v.leeway = 0;
        v.validate_exp = true;
        v.validate_aud = false;
        v.set_required_spec_claims(&["exp"]);
        v
    }

    fn sign(
        &self,
        user_id: UserId,
        roles: &[String],
        token_id: &TokenId,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        let key = self.key()?;
        let exp = (Utc::now() + ttl).timestamp();
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| TokenError::Signing(format!("expiry out of range: {exp}")))?;
        let claims = SignedClaims {
            token_id: token_id.as_str(),
            user_id: user_id.to_string(),
            roles,
            token_type,
            exp,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(key),
        )
        .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok((token, expires_at))
    }

    /// The one decode path: signature, expiry, type, then required claims.
    fn verify(&self, token: &str, expected: TokenType) -> Result<TokenClaims, TokenError> {
        let key = self.key()?;
        let data = decode::<RawClaims>(token, &DecodingKey::from_secret(key), &Self::validation())
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => {
                    TokenError::InvalidClaims(e.to_string())
                }
                _ => TokenError::InvalidSignature,
            })?;
        let raw = data.claims;

        let found = raw.token_type.unwrap_or_default();
        if found != expected.as_str() {
            return Err(TokenError::WrongType { expected, found });
        }

        let user_id = raw
            .user_id
            .ok_or_else(|| TokenError::InvalidClaims("missing user_id".to_string()))?
            .parse::<UserId>()
            .map_err(|e| TokenError::InvalidClaims(format!("user_id: {e}")))?;

        let token_id = raw
            .token_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| TokenError::InvalidClaims("missing token_id".to_string()))?;

        let roles = raw.roles.unwrap_or_default();
        if expected == TokenType::Refresh && roles.is_empty() {
            return Err(TokenError::InvalidClaims("missing roles".to_string()));
        }

        let expires_at = DateTime::from_timestamp(raw.exp, 0)
            .ok_or_else(|| TokenError::InvalidClaims(format!("exp out of range: {}", raw.exp)))?;

        Ok(TokenClaims {
            token_id: TokenId(token_id),
            user_id,
            roles,
            token_type: expected,
            expires_at,
        })
    }
}

#[async_trait::async_trait]
impl TokenCodec for JwtHmacCodec {
    async fn issue_access_token(
        &self,
        user_id: UserId,
        roles: &[String],
        token_id: &TokenId,
    ) -> Result<(AccessToken, DateTime<Utc>), TokenError> {
        let (token, exp) = self.sign(
            user_id,
            roles,
            token_id,
            TokenType::Access,
            self.cfg.access_ttl,
        )?;
        Ok((AccessToken(token), exp))
    }

    async fn issue_refresh_token(
        &self,
        user_id: UserId,
        roles: &[String],
        token_id: &TokenId,
    ) -> Result<(RefreshToken, DateTime<Utc>), TokenError> {
        let (token, exp) = self.sign(
            user_id,
            roles,
            token_id,
            TokenType::Refresh,
            self.cfg.refresh_ttl,
        )?;
        Ok((RefreshToken(token), exp))
    }

    async fn verify_access_token(&self, token: &AccessToken) -> Result<TokenClaims, TokenError> {
        self.verify(&token.0, TokenType::Access)
    }

    async fn verify_refresh_token(
        &self,
        token: &RefreshToken,
    ) -> Result<TokenClaims, TokenError> {
        self.verify(&token.0, TokenType::Refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &[u8] = b"unit-test-secret";

    fn codec() -> JwtHmacCodec {
        JwtHmacCodec::new(JwtConfig {
            access_ttl: Duration::from_secs(60),
            refresh_ttl: Duration::from_secs(600),
            signing_key: SECRET.to_vec(),
        })
    }

    fn forge(claims: serde_json::Value, algorithm: Algorithm, secret: &[u8]) -> String {
        encode(
            &Header::new(algorithm),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    fn roles() -> Vec<String> {
        vec!["student".to_string()]
    }

    #[tokio::test]
    async fn issued_tokens_verify_with_matching_type() {
        let codec = codec();
        let user_id = UserId::new_v4();
        let token_id = TokenId::generate();

        let (access, access_exp) = codec
            .issue_access_token(user_id, &roles(), &token_id)
            .await
            .unwrap();
        let (refresh, refresh_exp) = codec
            .issue_refresh_token(user_id, &roles(), &token_id)
            .await
            .unwrap();
        assert!(refresh_exp > access_exp);

        let claims = codec.verify_access_token(&access).await.unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.token_id, token_id);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.expires_at, access_exp);

        let claims = codec.verify_refresh_token(&refresh).await.unwrap();
        assert_eq!(claims.roles, roles());
        assert_eq!(claims.token_type, TokenType::Refresh);
    }

    #[tokio::test]
    async fn token_types_are_not_interchangeable() {
        let codec = codec();
        let user_id = UserId::new_v4();
        let token_id = TokenId::generate();
        let (access, _) = codec
            .issue_access_token(user_id, &roles(), &token_id)
            .await
            .unwrap();
        let (refresh, _) = codec
            .issue_refresh_token(user_id, &roles(), &token_id)
            .await
            .unwrap();

        let err = codec
            .verify_refresh_token(&RefreshToken(access.0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TokenError::WrongType { expected: TokenType::Refresh, .. }
        ));

        let err = codec
            .verify_access_token(&AccessToken(refresh.0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TokenError::WrongType { expected: TokenType::Access, .. }
        ));
    }

    #[tokio::test]
    async fn expired_tokens_are_rejected_without_leeway() {
        let token = forge(
            json!({
                "token_id": "t-1",
                "user_id": UserId::new_v4().to_string(),
                "roles": ["student"],
                "type": "refresh",
                "exp": Utc::now().timestamp() - 1,
            }),
            Algorithm::HS256,
            SECRET,
        );
        let err = codec()
            .verify_refresh_token(&RefreshToken(token))
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::Expired));
    }

    #[tokio::test]
    async fn other_hmac_variants_are_accepted() {
        let user_id = UserId::new_v4();
        let token = forge(
            json!({
                "token_id": "t-384",
                "user_id": user_id.to_string(),
                "roles": ["manager"],
                "type": "access",
                "exp": Utc::now().timestamp() + 60,
            }),
            Algorithm::HS384,
            SECRET,
        );
        let claims = codec()
            .verify_access_token(&AccessToken(token))
            .await
            .unwrap();
        assert_eq!(claims.user_id, user_id);
    }

    #[tokio::test]
    async fn wrong_secret_or_garbage_is_invalid_signature() {
        let token = forge(
            json!({
                "token_id": "t-1",
                "user_id": UserId::new_v4().to_string(),
                "roles": ["student"],
                "type": "access",
                "exp": Utc::now().timestamp() + 60,
            }),
            Algorithm::HS256,
            b"someone-else",
        );
        let codec = codec();
        assert!(matches!(
            codec.verify_access_token(&AccessToken(token)).await,
            Err(TokenError::InvalidSignature)
        ));
        assert!(matches!(
            codec
                .verify_access_token(&AccessToken("garbage".to_string()))
                .await,
            Err(TokenError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn refresh_tokens_need_roles_and_token_id() {
        let codec = codec();
        let exp = Utc::now().timestamp() + 60;
        let user_id = UserId::new_v4().to_string();

        let no_roles = forge(
            json!({"token_id": "t-1", "user_id": &user_id, "roles": [], "type": "refresh", "exp": exp}),
            Algorithm::HS256,
            SECRET,
        );
        assert!(matches!(
            codec.verify_refresh_token(&RefreshToken(no_roles)).await,
            Err(TokenError::InvalidClaims(_))
        ));

        let no_id = forge(
            json!({"token_id": "", "user_id": &user_id, "roles": ["student"], "type": "refresh", "exp": exp}),
            Algorithm::HS256,
            SECRET,
        );
        assert!(matches!(
            codec.verify_refresh_token(&RefreshToken(no_id)).await,
            Err(TokenError::InvalidClaims(_))
        ));

        let bad_user = forge(
            json!({"token_id": "t-1", "user_id": "nope", "roles": ["student"], "type": "refresh", "exp": exp}),
            Algorithm::HS256,
            SECRET,
        );
        assert!(matches!(
            codec.verify_refresh_token(&RefreshToken(bad_user)).await,
            Err(TokenError::InvalidClaims(_))
        ));
    }

    #[tokio::test]
    async fn empty_secret_is_reported_on_issue_and_verify() {
        let codec = JwtHmacCodec::new(JwtConfig {
            access_ttl: Duration::from_secs(60),
            refresh_ttl: Duration::from_secs(600),
            signing_key: Vec::new(),
        });
        let err = codec
            .issue_access_token(UserId::new_v4(), &roles(), &TokenId::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::SecretNotConfigured));

        let err = codec
            .verify_refresh_token(&RefreshToken("x.y.z".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::SecretNotConfigured));
    }
}
