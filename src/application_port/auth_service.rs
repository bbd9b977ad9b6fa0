use crate::domain_model::*;
use crate::domain_port::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("signing secret is not configured")]
    SecretNotConfigured,
    #[error("token is malformed or its signature is invalid")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid claims: {0}")]
    InvalidClaims(String),
    #[error("expected a {expected} token, found {found:?}")]
    WrongType { expected: TokenType, found: String },
    #[error("signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is inactive")]
    AccountInactive,
    #[error("user not found")]
    UserNotFound,
    #[error("missing bearer token")]
    MissingBearer,
    #[error("token invalid: {0}")]
    InvalidToken(#[source] TokenError),
    #[error("token revoked or unknown")]
    TokenRevoked,
    #[error("refresh lock not acquired, server busy")]
    Busy,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("rotation incomplete, old session revoked: {0}")]
    RotationIncomplete(#[source] StoreError),
    #[error("repository error: {0}")]
    Repository(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<TokenError> for AuthError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::SecretNotConfigured => {
                AuthError::Configuration("jwt secret not configured".to_string())
            }
            TokenError::Signing(e) => AuthError::InternalError(e),
            other => AuthError::InvalidToken(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user: UserInfo,
    pub tokens: IssuedTokens,
}

/// Body of a refresh request; its canonical JSON is what gets fingerprinted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub user_id: UserId,
}

/// Serialized refresh payload, identical for every request sharing a fingerprint.
#[derive(Debug)]
pub struct RefreshReply {
    pub body: Box<RawValue>,
    pub replayed: bool,
}

/// Identity attached to a request that passed the authentication guard.
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
    pub user_id: UserId,
    pub roles: Vec<String>,
    pub token_id: TokenId,
}

#[derive(Debug, Clone)]
pub struct LogoutAllResult {
    pub user_id: UserId,
    pub revoked: u64,
}

/// Every way a logout can end. All of them are reported to the client as success.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutOutcome {
    MissingToken,
    SecretNotConfigured,
    InvalidToken,
    InvalidClaims,
    NotRefreshToken,
    NotInWhitelist,
    WhitelistUnavailable,
    DeleteFailed,
    Revoked,
}

impl LogoutOutcome {
    pub fn code(&self) -> &'static str {
        match self {
            LogoutOutcome::MissingToken => "missing_token",
            LogoutOutcome::SecretNotConfigured => "secret_not_configured",
            LogoutOutcome::InvalidToken => "invalid_token",
            LogoutOutcome::InvalidClaims => "invalid_claims",
            LogoutOutcome::NotRefreshToken => "not_refresh_token",
            LogoutOutcome::NotInWhitelist => "not_in_whitelist",
            LogoutOutcome::WhitelistUnavailable => "whitelist_unavailable",
            LogoutOutcome::DeleteFailed => "delete_failed",
            LogoutOutcome::Revoked => "revoked",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            LogoutOutcome::MissingToken => {
                "Logout successful but token invalid: missing refresh_token"
            }
            LogoutOutcome::SecretNotConfigured => {
                "Logout successful but token invalid: jwt secret not configured"
            }
            LogoutOutcome::InvalidToken => {
                "Logout successful but token invalid: invalid refresh token"
            }
            LogoutOutcome::InvalidClaims => "Logout successful but token invalid: invalid claims",
            LogoutOutcome::NotRefreshToken => {
                "Logout successful but token invalid: token is not a refresh token"
            }
            LogoutOutcome::NotInWhitelist => {
                "Logout successful but token invalid: token ID not found in whitelist"
            }
            LogoutOutcome::WhitelistUnavailable => {
                "Logout successful but token invalid: whitelist unavailable"
            }
            LogoutOutcome::DeleteFailed => {
                "Logout successful but token invalid: failed to delete refresh token"
            }
            LogoutOutcome::Revoked => "Logout successful, token deleted from whitelist",
        }
    }
}

#[async_trait::async_trait]
pub trait TokenCodec: Send + Sync {
    async fn issue_access_token(
        &self,
        user_id: UserId,
        roles: &[String],
        token_id: &TokenId,
    ) -> Result<(AccessToken, DateTime<Utc>), TokenError>;
    async fn issue_refresh_token(
        &self,
        user_id: UserId,
        roles: &[String],
        token_id: &TokenId,
    ) -> Result<(RefreshToken, DateTime<Utc>), TokenError>;
    async fn verify_access_token(&self, token: &AccessToken) -> Result<TokenClaims, TokenError>;
    async fn verify_refresh_token(&self, token: &RefreshToken)
    -> Result<TokenClaims, TokenError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError>;
    /// Validates the raw `Authorization` header value of a request.
    async fn authenticate(&self, authorization: Option<&str>) -> Result<AuthContext, AuthError>;
    async fn refresh(&self, request: RefreshRequest) -> Result<RefreshReply, AuthError>;
    async fn logout(&self, refresh_token: Option<RefreshToken>) -> LogoutOutcome;
    async fn logout_all(&self, request: LoginInput) -> Result<LogoutAllResult, AuthError>;
}
