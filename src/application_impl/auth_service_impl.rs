use super::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use std::sync::Arc;

/// Session lifecycle backed by a user store and the shared whitelist store.
pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    issuer: Arc<TokenIssuer>,
    guard: AuthGuard,
    coordinator: RefreshCoordinator,
    revocation: SessionRevocation,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        store: Arc<dyn WhitelistStore>,
        keys: KeySpace,
        refresh_settings: RefreshSettings,
    ) -> Self {
        let whitelist = Arc::new(SessionWhitelist::new(store.clone(), keys.clone()));
        let issuer = Arc::new(TokenIssuer::new(token_codec.clone(), whitelist.clone()));
        RealAuthService {
            user_repo,
            credential_hasher,
            guard: AuthGuard::new(token_codec.clone(), whitelist.clone()),
            coordinator: RefreshCoordinator::new(
                store,
                keys,
                token_codec.clone(),
                issuer.clone(),
                whitelist.clone(),
                refresh_settings,
            ),
            revocation: SessionRevocation::new(token_codec, whitelist),
            issuer,
        }
    }

    async fn check_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserCredentialsRecord, AuthError> {
        let rec = self
            .user_repo
            .get_credentials_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let ok = self
            .credential_hasher
            .verify_password(password, &rec.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(rec)
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let LoginInput { username, password } = request;

        let rec = self
            .check_credentials(&username, &password)
            .await
            .inspect_err(|e| info!(%username, error = %e, "login rejected"))?;

        if rec.status == AccountStatus::Inactive {
            info!(%username, "login rejected for inactive account");
            return Err(AuthError::AccountInactive);
        }

        let user = self
            .user_repo
            .get_user_info(rec.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let tokens = self.issuer.issue(user.user_id, &user.roles).await?;

        Ok(LoginResult { user, tokens })
    }

    async fn authenticate(&self, authorization: Option<&str>) -> Result<AuthContext, AuthError> {
        self.guard.authenticate(authorization).await
    }

    async fn refresh(&self, request: RefreshRequest) -> Result<RefreshReply, AuthError> {
        self.coordinator.refresh(&request).await
    }

    async fn logout(&self, refresh_token: Option<RefreshToken>) -> LogoutOutcome {
        self.revocation.logout(refresh_token).await
    }

    async fn logout_all(&self, request: LoginInput) -> Result<LogoutAllResult, AuthError> {
        let LoginInput { username, password } = request;
        let rec = self.check_credentials(&username, &password).await?;
        self.revocation.logout_all(rec.user_id).await
    }
}
