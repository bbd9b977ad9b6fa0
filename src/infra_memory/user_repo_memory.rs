use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;

#[derive(Debug, Clone)]
struct FakeAccount {
    credentials: UserCredentialsRecord,
    info: UserInfo,
}

/// In-memory user store keyed by username.
#[derive(Debug, Default)]
pub struct FakeUserRepo {
    accounts: DashMap<String, FakeAccount>,
}

impl FakeUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, info: UserInfo, password_hash: String, status: AccountStatus) {
        let credentials = UserCredentialsRecord {
            user_id: info.user_id,
            username: info.username.clone(),
            password_hash,
            status,
        };
        self.accounts
            .insert(info.username.clone(), FakeAccount { credentials, info });
    }

    /// Seeds one student and one manager, both with password `password123`.
    pub async fn with_demo_accounts(hasher: &dyn CredentialHasher) -> Result<Self, AuthError> {
        let repo = Self::new();
        let password_hash = hasher.hash_password("password123").await?;
        for (username, display_name, role) in [
            ("student01", "Demo Student", "student"),
            ("manager01", "Demo Manager", "manager"),
        ] {
            repo.insert(
                UserInfo {
                    user_id: UserId::new_v4(),
                    email: format!("{username}@stu.ptit.edu.vn"),
                    username: username.to_string(),
                    display_name: display_name.to_string(),
                    avatar: String::new(),
                    roles: vec![role.to_string()],
                },
                password_hash.clone(),
                AccountStatus::Active,
            );
        }
        Ok(repo)
    }
}

#[async_trait::async_trait]
impl UserRepo for FakeUserRepo {
    async fn get_credentials_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentialsRecord>, AuthError> {
        Ok(self
            .accounts
            .get(username)
            .map(|account| account.credentials.clone()))
    }

    async fn get_user_info(&self, user_id: UserId) -> Result<Option<UserInfo>, AuthError> {
        Ok(self
            .accounts
            .iter()
            .find(|account| account.info.user_id == user_id)
            .map(|account| account.info.clone()))
    }
}
