use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct UserId(pub uuid::Uuid);

impl UserId {
    pub fn new_v4() -> Self {
        UserId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(UserId)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl std::str::FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            other => Err(format!("unknown account status: {other}")),
        }
    }
}

/// Display data returned alongside a freshly issued session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: UserId,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub avatar: String,
    pub roles: Vec<String>,
}

/// Roles whose display data lives in the managers table.
pub const STAFF_ROLES: [&str; 3] = ["manager", "admin_system", "non-manager"];

impl UserInfo {
    pub fn is_staff(&self) -> bool {
        self.roles
            .iter()
            .any(|role| STAFF_ROLES.contains(&role.as_str()))
    }
}
