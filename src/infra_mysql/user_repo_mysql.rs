use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    #[inline]
    fn uid_as_bytes(id: &UserId) -> &[u8] {
        id.0.as_bytes()
    }

    #[inline]
    fn uid_from_bytes(id: &[u8]) -> Result<UserId, AuthError> {
        Ok(UserId(
            Uuid::from_slice(id).map_err(|e| AuthError::Repository(e.to_string()))?,
        ))
    }

    fn row_to_credentials(row: MySqlRow) -> Result<UserCredentialsRecord, AuthError> {
        let user_id_bytes: Vec<u8> = row
            .try_get("id")
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        let user_id = Self::uid_from_bytes(&user_id_bytes)?;

        let username: String = row
            .try_get("username")
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        let password_hash: String = row
            .try_get("password_hash")
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        let status: String = row
            .try_get("status")
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        let status = status.parse::<AccountStatus>().map_err(AuthError::Repository)?;

        Ok(UserCredentialsRecord {
            user_id,
            username,
            password_hash,
            status,
        })
    }

    async fn display_of(
        &self,
        user_id: &UserId,
        staff: bool,
    ) -> Result<Option<(String, String)>, AuthError> {
        let query = if staff {
            "SELECT fullname, avatar FROM managers WHERE id = ?"
        } else {
            "SELECT fullname, avatar FROM students WHERE id = ?"
        };
        let row_opt: Option<MySqlRow> = sqlx::query(query)
            .bind(Self::uid_as_bytes(user_id))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::Repository(format!("query display info: {e}")))?;

        row_opt
            .map(|row| -> Result<(String, String), AuthError> {
                let fullname: Option<String> = row
                    .try_get("fullname")
                    .map_err(|e| AuthError::Repository(e.to_string()))?;
                let avatar: Option<String> = row
                    .try_get("avatar")
                    .map_err(|e| AuthError::Repository(e.to_string()))?;
                Ok((fullname.unwrap_or_default(), avatar.unwrap_or_default()))
            })
            .transpose()
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn get_credentials_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentialsRecord>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, username, password_hash, status
FROM users
WHERE username = ?
"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Repository(e.to_string()))?;

        row_opt.map(Self::row_to_credentials).transpose()
    }

    async fn get_user_info(&self, user_id: UserId) -> Result<Option<UserInfo>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT u.email, u.username, GROUP_CONCAT(r.name ORDER BY r.name SEPARATOR ',') AS roles
FROM users u
LEFT JOIN user_roles ur ON u.id = ur.user_id
LEFT JOIN roles r ON ur.role_id = r.id
WHERE u.id = ?
GROUP BY u.id, u.email, u.username
"#,
        )
        .bind(Self::uid_as_bytes(&user_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Repository(format!("query user info: {e}")))?;

        let Some(row) = row_opt else {
            return Ok(None);
        };

        let email: String = row
            .try_get("email")
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        let username: String = row
            .try_get("username")
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        let roles: Option<String> = row
            .try_get("roles")
            .map_err(|e| AuthError::Repository(e.to_string()))?;
        let roles: Vec<String> = roles
            .map(|joined| {
                joined
                    .split(',')
                    .filter(|role| !role.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut info = UserInfo {
            user_id,
            email,
            username,
            display_name: String::new(),
            avatar: String::new(),
            roles,
        };
        if let Some((display_name, avatar)) = self.display_of(&user_id, info.is_staff()).await? {
            info.display_name = display_name;
            info.avatar = avatar;
        }

        Ok(Some(info))
    }
}
