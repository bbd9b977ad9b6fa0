use crate::application_port::*;
use crate::domain_model::*;

#[derive(Debug, Clone)]
pub struct UserCredentialsRecord {
    pub user_id: UserId,
    pub username: String,
    pub password_hash: String,
    pub status: AccountStatus,
}

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    /// Fetch credentials by username (for login and logout-all).
    async fn get_credentials_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentialsRecord>, AuthError>;

    /// Display data and roles for a user.
    async fn get_user_info(&self, user_id: UserId) -> Result<Option<UserInfo>, AuthError>;
}
