use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::{Settings, StoreBackend, UserBackend};
use sqlx::{MySql, Pool};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let cancel = CancellationToken::new();
        let mut sweeper_handle = None;

        let store: Arc<dyn WhitelistStore> = match settings.store.backend {
            StoreBackend::Redis => {
                let store = RedisWhitelistStore::connect(&settings.store.redis_url)
                    .await
                    .inspect_err(|e| error!(error = %e, "redis unreachable at startup"))?;
                Arc::new(store)
            }
            StoreBackend::Memory => {
                warn!("using in-memory whitelist store; sessions are not shared across processes");
                let store = Arc::new(MemoryWhitelistStore::new());
                sweeper_handle = Some(store.spawn_sweeper(SWEEP_INTERVAL, cancel.clone()));
                store
            }
        };

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher::new());

        let mut pool = None;
        let user_repo: Arc<dyn UserRepo> = match settings.user.backend {
            UserBackend::Real => {
                let mysql = Pool::<MySql>::connect(&settings.user.mysql_dsn).await?;
                pool = Some(mysql.clone());
                Arc::new(MySqlUserRepo::new(mysql))
            }
            UserBackend::Fake => {
                warn!("using fake user store with demo accounts");
                Arc::new(FakeUserRepo::with_demo_accounts(credential_hasher.as_ref()).await?)
            }
        };

        if settings.auth.jwt_secret.is_empty() {
            warn!("auth.jwt_secret is empty; every token operation will fail");
        }
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHmacCodec::new(settings.jwt_config()));

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            user_repo,
            credential_hasher,
            token_codec,
            store,
            KeySpace::new(settings.store.key_prefix.clone()),
            settings.refresh_settings(),
        ));

        info!("server started");

        Ok(Self {
            auth_service,
            sweeper_handle: Mutex::new(sweeper_handle),
            cancel,
            pool,
        })
    }

    /// A server around an already-built service, with no background tasks.
    pub fn with_services(auth_service: Arc<dyn AuthService>) -> Self {
        Self {
            auth_service,
            sweeper_handle: Mutex::new(None),
            cancel: CancellationToken::new(),
            pool: None,
        }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");
        self.cancel.cancel();

        let sweeper = self
            .sweeper_handle
            .lock()
            .ok()
            .and_then(|mut handle| handle.take());
        if let Some(handle) = sweeper {
            let r = handle.await;
            info!("sweeper handle dropped: {:?}", r);
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
