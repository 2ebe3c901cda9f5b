//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the fetcher, store and scheduler from a validated `ClientConfig`
//! - Perform the initial fetch (fail fast or fall back to the snapshot cache)
//! - Start background tasks (refresh loop, admin API)
//!
//! # Design Decisions
//! - Listeners are bound before anything is spawned, so a bind failure
//!   leaves nothing running
//! - The store exists before any binding; bindings are created from it

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin::{self, AdminState};
use crate::binding::{FromConfigValue, PropertyBinding};
use crate::config::ClientConfig;
use crate::fetch::http::BuildError;
use crate::fetch::{ConfigFetcher, FetchError, HttpFetcher};
use crate::lifecycle::shutdown::Shutdown;
use crate::refresh::{RefreshHandle, RefreshOutcome, RefreshScheduler};
use crate::store::{ConfigStore, SnapshotCache};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Fetcher(#[from] BuildError),

    #[error("initial configuration fetch failed: {0}")]
    InitialFetch(#[from] FetchError),

    #[error("failed to bind admin API on {address}: {source}")]
    AdminBind {
        address: String,
        #[source]
        source: io::Error,
    },
}

/// A running client: the store plus the background tasks feeding it.
pub struct ConfigClient {
    store: Arc<ConfigStore>,
    refresh: RefreshHandle,
    admin_addr: Option<SocketAddr>,
    tasks: Vec<JoinHandle<()>>,
}

impl ConfigClient {
    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn refresh_handle(&self) -> RefreshHandle {
        self.refresh.clone()
    }

    /// Address the admin API is listening on, when enabled.
    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin_addr
    }

    pub fn bind<T>(&self, key: impl Into<String>, default: T) -> PropertyBinding<T>
    where
        T: FromConfigValue + Clone + PartialEq + Send + Sync + 'static,
    {
        self.store.bind(key, default)
    }

    /// Wait for background tasks to finish. Call after triggering shutdown.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Background task failed");
            }
        }
    }
}

/// Start a client against the HTTP configuration service in `config`.
pub async fn start(
    config: &ClientConfig,
    shutdown: &Shutdown,
) -> Result<ConfigClient, StartupError> {
    let fetcher = HttpFetcher::new(&config.service, config.refresh.request_timeout())?;
    tracing::info!(
        endpoint = %fetcher.endpoint(),
        application = %config.service.application,
        profile = %config.service.profile,
        "Configuration service endpoint"
    );
    start_with_fetcher(fetcher, config, shutdown).await
}

/// Start a client with any [`ConfigFetcher`].
pub async fn start_with_fetcher<F: ConfigFetcher>(
    fetcher: F,
    config: &ClientConfig,
    shutdown: &Shutdown,
) -> Result<ConfigClient, StartupError> {
    let admin_listener = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address)
            .await
            .map_err(|source| StartupError::AdminBind {
                address: config.admin.bind_address.clone(),
                source,
            })?;
        Some(listener)
    } else {
        None
    };

    let store = Arc::new(ConfigStore::default());
    let mut scheduler = RefreshScheduler::new(fetcher, store.clone(), &config.refresh);
    if let Some(path) = &config.cache.snapshot_path {
        scheduler = scheduler.with_cache(SnapshotCache::new(path));
    }

    match scheduler.initial_load(config.refresh.fail_fast).await? {
        RefreshOutcome::Applied { version, .. } => {
            tracing::info!(
                version = %version,
                keys = store.read().len(),
                "Initial configuration loaded"
            );
        }
        RefreshOutcome::Unchanged => {}
        RefreshOutcome::Failed { error, retry_in } => {
            tracing::warn!(
                error = %error,
                retry_in = ?retry_in,
                version = %store.version(),
                "Starting without fresh configuration"
            );
        }
    }

    let refresh = scheduler.handle();
    let admin_addr = admin_listener.as_ref().and_then(|l| l.local_addr().ok());
    let mut tasks = vec![tokio::spawn(scheduler.run(shutdown.subscribe()))];

    if let Some(listener) = admin_listener {
        let state = AdminState {
            store: store.clone(),
            refresh: refresh.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
        };
        let rx = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, state, rx).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        }));
    }

    Ok(ConfigClient {
        store,
        refresh,
        admin_addr,
        tasks,
    })
}
