use dormgate::api;
use dormgate::application_impl::*;
use dormgate::application_port::*;
use dormgate::domain_model::*;
use dormgate::domain_port::*;
use dormgate::infra_memory::*;
use dormgate::server::Server;
use futures_util::future::join_all;
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use warp::Filter;
use warp::http::StatusCode;
use warp::test::request;

const PREFIX: &str = "it";

struct App<F> {
    store: Arc<MemoryWhitelistStore>,
    filter: F,
}

async fn app()
-> App<impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone + 'static> {
    let hasher = Arc::new(Argon2PasswordHasher::with_params(8, 1, 1).unwrap());
    let users = Arc::new(FakeUserRepo::with_demo_accounts(hasher.as_ref()).await.unwrap());
    let store = Arc::new(MemoryWhitelistStore::new());
    let codec = Arc::new(JwtHmacCodec::new(JwtConfig {
        access_ttl: Duration::from_secs(900),
        refresh_ttl: Duration::from_secs(3600),
        signing_key: b"integration-secret".to_vec(),
    }));
    let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
        users,
        hasher,
        codec,
        store.clone(),
        KeySpace::new(PREFIX),
        RefreshSettings::default(),
    ));
    let server = Arc::new(Server::with_services(auth_service));

    let filter = warp::path("api")
        .and(warp::path("v1"))
        .and(api::v1::routes(server))
        .recover(api::v1::recover_error);
    App { store, filter }
}

fn body_of(response: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

async fn login<F>(app: &App<F>, username: &str) -> Value
where
    F: Filter + 'static,
    F::Extract: warp::Reply + Send,
{
    let response = request()
        .method("POST")
        .path("/api/v1/login")
        .json(&json!({"username": username, "password": "password123"}))
        .reply(&app.filter)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_of(&response)["data"].clone()
}

async fn me<F>(app: &App<F>, access_token: &str) -> StatusCode
where
    F: Filter + 'static,
    F::Extract: warp::Reply + Send,
{
    request()
        .method("GET")
        .path("/api/v1/me")
        .header("authorization", format!("Bearer {access_token}"))
        .reply(&app.filter)
        .await
        .status()
}

#[tokio::test]
async fn login_then_me() {
    let app = app().await;
    let data = login(&app, "manager01").await;
    assert_eq!(data["user"]["username"], "manager01");
    assert_eq!(data["user"]["roles"], json!(["manager"]));
    assert!(data["refresh_token_expires_at"].is_string());

    let access = data["access_token"].as_str().unwrap();
    let response = request()
        .method("GET")
        .path("/api/v1/me")
        .header("authorization", format!("Bearer {access}"))
        .reply(&app.filter)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_of(&response)["data"]["user_id"], data["user"]["user_id"]);

    let anonymous = request()
        .method("GET")
        .path("/api/v1/me")
        .reply(&app.filter)
        .await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_of(&anonymous)["success"], false);
}

#[tokio::test]
async fn login_failures_use_the_right_status() {
    let app = app().await;
    let wrong = request()
        .method("POST")
        .path("/api/v1/login")
        .json(&json!({"username": "student01", "password": "wrong"}))
        .reply(&app.filter)
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_of(&wrong)["error"]["code"], "InvalidCredentials");

    let malformed = request()
        .method("POST")
        .path("/api/v1/login")
        .json(&json!({"username": "student01"}))
        .reply(&app.filter)
        .await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    let unknown = request()
        .method("GET")
        .path("/api/v1/nowhere")
        .reply(&app.filter)
        .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn parallel_refresh_then_replay_after_expiry() {
    let app = app().await;
    let data = login(&app, "student01").await;
    let old_access = data["access_token"].as_str().unwrap().to_string();
    let payload = json!({"refresh_token": data["refresh_token"]});

    let responses = join_all((0..5).map(|_| {
        request()
            .method("POST")
            .path("/api/v1/refresh")
            .json(&payload)
            .reply(&app.filter)
    }))
    .await;

    assert!(responses.iter().all(|r| r.status() == StatusCode::OK));
    let first = responses[0].body();
    assert!(responses.iter().all(|r| r.body() == first));

    let rotated = body_of(&responses[0])["data"].clone();
    assert_eq!(rotated["user_id"], data["user"]["user_id"]);
    assert_eq!(me(&app, rotated["access_token"].as_str().unwrap()).await, StatusCode::OK);
    assert_eq!(me(&app, &old_access).await, StatusCode::UNAUTHORIZED);

    tokio::time::advance(Duration::from_secs(21)).await;
    let replay = request()
        .method("POST")
        .path("/api/v1/refresh")
        .json(&payload)
        .reply(&app.filter)
        .await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_of(&replay)["error"]["message"], "Token is not valid");
}

#[tokio::test(start_paused = true)]
async fn held_lock_yields_too_many_requests() {
    let app = app().await;
    let data = login(&app, "student01").await;
    let refresh = RefreshRequest {
        refresh_token: data["refresh_token"].as_str().unwrap().to_string(),
    };
    let lock_key = KeySpace::new(PREFIX).refresh_lock(&RequestFingerprint::of(&refresh).unwrap());
    app.store
        .set_if_absent(&lock_key, "someone-else", Duration::from_secs(60))
        .await
        .unwrap();

    let response = request()
        .method("POST")
        .path("/api/v1/refresh")
        .json(&refresh)
        .reply(&app.filter)
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body_of(&response)["error"]["message"],
        "Server busy, please retry"
    );
}

#[tokio::test]
async fn logout_is_always_ok() {
    let app = app().await;
    let data = login(&app, "student01").await;
    let payload = json!({"refresh_token": data["refresh_token"]});

    let empty = request()
        .method("POST")
        .path("/api/v1/logout")
        .reply(&app.filter)
        .await;
    assert_eq!(empty.status(), StatusCode::OK);
    assert_eq!(body_of(&empty)["data"]["outcome"], "missing_token");

    let first = request()
        .method("POST")
        .path("/api/v1/logout")
        .json(&payload)
        .reply(&app.filter)
        .await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(
        body_of(&first)["data"]["message"],
        "Logout successful, token deleted from whitelist"
    );

    let second = request()
        .method("POST")
        .path("/api/v1/logout")
        .json(&payload)
        .reply(&app.filter)
        .await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(
        body_of(&second)["data"]["message"],
        "Logout successful but token invalid: token ID not found in whitelist"
    );
    assert_eq!(
        me(&app, data["access_token"].as_str().unwrap()).await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn oversized_logout_body_is_not_read() {
    let app = app().await;
    let data = login(&app, "student01").await;
    let padded = json!({
        "refresh_token": data["refresh_token"],
        "padding": "x".repeat(20 * 1024),
    });

    let response = request()
        .method("POST")
        .path("/api/v1/logout")
        .json(&padded)
        .reply(&app.filter)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_of(&response)["data"]["outcome"], "missing_token");
    assert_eq!(
        me(&app, data["access_token"].as_str().unwrap()).await,
        StatusCode::OK
    );
}

#[tokio::test]
async fn logout_all_revokes_every_session() {
    let app = app().await;
    let mut sessions = Vec::new();
    for _ in 0..3 {
        sessions.push(login(&app, "student01").await);
    }
    let bystander = login(&app, "manager01").await;

    let response = request()
        .method("POST")
        .path("/api/v1/logout-all")
        .json(&json!({"username": "student01", "password": "password123"}))
        .reply(&app.filter)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_of(&response)["data"]["revoked"], 6);

    for session in &sessions {
        assert_eq!(
            me(&app, session["access_token"].as_str().unwrap()).await,
            StatusCode::UNAUTHORIZED
        );
    }
    assert_eq!(
        me(&app, bystander["access_token"].as_str().unwrap()).await,
        StatusCode::OK
    );
}

#[tokio::test]
async fn health_reports_version() {
    let app = app().await;
    let response = request()
        .method("GET")
        .path("/api/v1/health")
        .reply(&app.filter)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_of(&response)["data"]["version"],
        env!("CARGO_PKG_VERSION")
    );
}
