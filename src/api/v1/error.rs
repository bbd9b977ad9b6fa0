use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let code = if let Some(code) = err.find::<ApiErrorCode>() {
        code.clone()
    } else if err.find::<warp::body::BodyDeserializeError>().is_some()
        || err.find::<reject::LengthRequired>().is_some()
        || err.find::<reject::PayloadTooLarge>().is_some()
        || err.find::<reject::UnsupportedMediaType>().is_some()
    {
        ApiErrorCode::BadRequest
    } else if err.is_not_found() || err.find::<reject::MethodNotAllowed>().is_some() {
        // Unmatched routes also surface as method mismatches of sibling routes.
        ApiErrorCode::NotFound
    } else {
        error!(rejection = ?err, "unhandled rejection");
        ApiErrorCode::InternalError
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code.clone(), code.to_string()));
    Ok(warp::reply::with_status(json, code.status()))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Account is inactive")]
    AccountInactive,
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Server busy, please retry")]
    TooManyRequests,
    #[error("Session could not be renewed, please log in again")]
    SessionLost,
    #[error("Invalid request body")]
    BadRequest,
    #[error("Not found")]
    NotFound,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidCredentials
            | ApiErrorCode::AccountInactive
            | ApiErrorCode::MissingToken
            | ApiErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::SessionLost | ApiErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::AccountInactive => ApiErrorCode::AccountInactive,
            AuthError::MissingBearer => ApiErrorCode::MissingToken,
            // Expired, revoked and malformed tokens look the same to clients.
            AuthError::InvalidToken(_) | AuthError::TokenRevoked => ApiErrorCode::InvalidToken,
            AuthError::UserNotFound => {
                ApiErrorCode::internal("credentials without a user profile")
            }
            AuthError::Busy => ApiErrorCode::TooManyRequests,
            AuthError::RotationIncomplete(e) => {
                error!(op = e.op, key = %e.key, error = %e.message, "rotation incomplete");
                ApiErrorCode::SessionLost
            }
            AuthError::StoreUnavailable(e) => {
                error!(op = e.op, key = %e.key, error = %e.message, "store unavailable");
                ApiErrorCode::InternalError
            }
            AuthError::Configuration(e) => ApiErrorCode::internal(e),
            AuthError::Repository(e) => ApiErrorCode::internal(e),
            AuthError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}
