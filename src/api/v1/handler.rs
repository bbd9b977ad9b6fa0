use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::hyper::body::Bytes;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

impl From<CredentialsRequest> for LoginInput {
    fn from(body: CredentialsRequest) -> Self {
        LoginInput {
            username: body.username,
            password: body.password,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub user: UserInfo,
}

pub async fn login(
    body: CredentialsRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_result = auth_service
        .login(body.into())
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let LoginResult { user, tokens } = login_result;
    let login_response = LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        access_token_expires_at: tokens.access_token_expires_at,
        refresh_token_expires_at: tokens.refresh_token_expires_at,
        user,
    };

    Ok(warp::reply::json(&ApiResponse::ok(login_response)))
}

/// Duplicate submissions get the cached payload embedded verbatim.
pub async fn refresh(
    body: RefreshRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let reply = auth_service
        .refresh(body)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(reply.body)))
}

#[derive(Debug, Deserialize)]
struct LogoutRequest {
    refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub outcome: LogoutOutcome,
    pub message: &'static str,
}

// Takes raw bytes: an absent or malformed body is still a successful logout.
pub async fn logout(
    body: Bytes,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let refresh_token = serde_json::from_slice::<LogoutRequest>(&body)
        .ok()
        .and_then(|request| request.refresh_token)
        .map(RefreshToken);

    let outcome = auth_service.logout(refresh_token).await;
    let response = LogoutResponse {
        outcome,
        message: outcome.message(),
    };
    Ok(warp::reply::json(&ApiResponse::ok(response)))
}

#[derive(Debug, Serialize)]
pub struct LogoutAllResponse {
    pub message: &'static str,
    pub revoked: u64,
}

pub async fn logout_all(
    body: CredentialsRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let result = auth_service
        .logout_all(body.into())
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let response = LogoutAllResponse {
        message: "Logged out from all sessions",
        revoked: result.revoked,
    };
    Ok(warp::reply::json(&ApiResponse::ok(response)))
}

pub async fn me(context: AuthContext) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(context)))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub time: DateTime<Utc>,
}

pub async fn health() -> Result<impl warp::Reply, warp::Rejection> {
    let response = HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        time: Utc::now(),
    };
    Ok(warp::reply::json(&ApiResponse::ok(response)))
}
