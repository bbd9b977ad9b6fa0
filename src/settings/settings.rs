use crate::application_impl::{JwtConfig, RefreshSettings};
use anyhow::{Result, anyhow, ensure};
use config::{Config, Environment, File, Source};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub refresh: Refresh,
    pub store: Store,
    pub user: User,
    pub http: Http,
    pub log: Log,
}

#[derive(Deserialize)]
pub struct Auth {
    /// Empty is accepted here and reported per request.
    #[serde(default)]
    pub jwt_secret: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Refresh {
    pub lock_ttl_secs: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub response_ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

#[derive(Deserialize)]
pub struct Store {
    pub backend: StoreBackend,
    #[serde(default)]
    pub redis_url: String,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserBackend {
    Real,
    Fake,
}

#[derive(Deserialize)]
pub struct User {
    pub backend: UserBackend,
    #[serde(default)]
    pub mysql_dsn: String,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() { "<empty>" } else { "<redacted>" }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("jwt_secret", &redacted(&self.jwt_secret))
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.backend)
            .field("redis_url", &redacted(&self.redis_url))
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("backend", &self.backend)
            .field("mysql_dsn", &redacted(&self.mysql_dsn))
            .finish()
    }
}

impl Settings {
    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig {
            access_ttl: Duration::from_secs(self.auth.access_ttl_secs),
            refresh_ttl: Duration::from_secs(self.auth.refresh_ttl_secs),
            signing_key: self.auth.jwt_secret.clone().into_bytes(),
        }
    }

    pub fn refresh_settings(&self) -> RefreshSettings {
        RefreshSettings {
            lock_ttl: Duration::from_secs(self.refresh.lock_ttl_secs),
            retry_attempts: self.refresh.retry_attempts,
            retry_backoff: Duration::from_millis(self.refresh.retry_backoff_ms),
            response_ttl: Duration::from_secs(self.refresh.response_ttl_secs),
        }
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.auth.access_ttl_secs > 0, "auth.access_ttl_secs must be > 0");
        ensure!(
            self.auth.refresh_ttl_secs > 0,
            "auth.refresh_ttl_secs must be > 0"
        );
        ensure!(self.refresh.lock_ttl_secs > 0, "refresh.lock_ttl_secs must be > 0");
        ensure!(
            self.refresh.response_ttl_secs > 0,
            "refresh.response_ttl_secs must be > 0"
        );
        ensure!(
            self.refresh.retry_attempts >= 1,
            "refresh.retry_attempts must be >= 1"
        );
        ensure!(
            self.refresh.response_ttl_secs < self.refresh.lock_ttl_secs,
            "refresh.response_ttl_secs ({}) must be shorter than refresh.lock_ttl_secs ({})",
            self.refresh.response_ttl_secs,
            self.refresh.lock_ttl_secs
        );
        ensure!(
            self.store.backend != StoreBackend::Redis || !self.store.redis_url.is_empty(),
            "store.redis_url is required for the redis backend"
        );
        ensure!(
            self.user.backend != UserBackend::Real || !self.user.mysql_dsn.is_empty(),
            "user.mysql_dsn is required for the real user backend"
        );
        ensure!(
            self.http.cert_path.is_some() == self.http.key_path.is_some(),
            "http.cert_path and http.key_path must be set together"
        );
        Ok(())
    }
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

const ENV_PREFIX: &str = "DORMGATE";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);
    load(File::with_name(path))
}

fn load<S>(file: S) -> Result<Settings>
where
    S: Source + Send + Sync + 'static,
{
    let settings: Settings = Config::builder()
        .set_default("auth.access_ttl_secs", 900)?
        .set_default("auth.refresh_ttl_secs", 7 * 24 * 60 * 60)?
        .set_default("refresh.lock_ttl_secs", 25)?
        .set_default("refresh.retry_attempts", 25)?
        .set_default("refresh.retry_backoff_ms", 1000)?
        .set_default("refresh.response_ttl_secs", 20)?
        .set_default("store.key_prefix", "dormgate")?
        .set_default("log.filter", "info")?
        .add_source(file)
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn load_str(toml: &str) -> Result<Settings> {
        load(File::from_str(toml, FileFormat::Toml))
    }

    const MINIMAL: &str = r#"
[auth]
jwt_secret = "s3cret"

[store]
backend = "memory"

[user]
backend = "fake"

[http]
address = "127.0.0.1:8080"
"#;

    #[test]
    fn defaults_fill_the_refresh_protocol() {
        let settings = load_str(MINIMAL).unwrap();
        let refresh = settings.refresh_settings();
        assert_eq!(refresh.lock_ttl, Duration::from_secs(25));
        assert_eq!(refresh.retry_attempts, 25);
        assert_eq!(refresh.retry_backoff, Duration::from_millis(1000));
        assert_eq!(refresh.response_ttl, Duration::from_secs(20));
        assert_eq!(settings.store.backend, StoreBackend::Memory);
        assert_eq!(settings.store.key_prefix, "dormgate");
    }

    #[test]
    fn cache_must_expire_before_the_lock() {
        let toml = format!("{MINIMAL}\n[refresh]\nlock_ttl_secs = 25\nresponse_ttl_secs = 25\n");
        let err = load_str(&toml).unwrap_err();
        assert!(err.to_string().contains("response_ttl_secs"));
    }

    #[test]
    fn redis_backend_needs_a_url() {
        let toml = MINIMAL.replace(r#"backend = "memory""#, r#"backend = "redis""#);
        assert!(load_str(&toml).is_err());
    }

    #[test]
    fn secrets_are_not_logged() {
        let settings = load_str(MINIMAL).unwrap();
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("s3cret"));
    }
}
