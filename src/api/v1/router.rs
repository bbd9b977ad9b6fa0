use super::error::*;
use super::handler;
use crate::application_port::*;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::hyper::body::Bytes;
use warp::{Filter, http, reject};

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let login = warp::post()
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::login);

    let refresh = warp::post()
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::refresh);

    let logout = warp::post()
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(logout_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::logout);

    let logout_all = warp::post()
        .and(warp::path("logout-all"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::logout_all);

    let me = warp::get()
        .and(warp::path("me"))
        .and(warp::path::end())
        .and(with_verification(server.auth_service.clone()))
        .and_then(handler::me);

    let health = warp::get()
        .and(warp::path("health"))
        .and(warp::path::end())
        .and_then(handler::health);

    login
        .or(refresh)
        .or(logout)
        .or(logout_all)
        .or(me)
        .or(health)
}

/// Logout always answers 200, so a missing, unsized or oversized body is
/// read as empty instead of rejecting.
fn logout_body() -> impl Filter<Extract = (Bytes,), Error = Infallible> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES)
        .and(warp::body::bytes())
        .or(warp::any().map(Bytes::new))
        .unify()
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_verification(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (AuthContext,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_str()).and_then(
        move |authorization: Option<String>| {
            let auth_service = auth_service.clone();
            async move {
                auth_service
                    .authenticate(authorization.as_deref())
                    .await
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)
            }
        },
    )
}
