//! The background refresh loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, Notify};
use tokio::time;

use crate::config::RefreshConfig;
use crate::fetch::{ConfigFetcher, FailureClass, FetchError, FetchOutcome};
use crate::observability::metrics;
use crate::refresh::backoff::BackoffPolicy;
use crate::refresh::state::{RefreshState, SchedulerStatus};
use crate::store::{ConfigStore, SnapshotCache, SwapOutcome};

/// What a single poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot was installed. `changed_keys` is empty when only the
    /// version marker moved.
    Applied {
        version: String,
        changed_keys: Vec<String>,
    },
    /// The service reported no change.
    Unchanged,
    /// The fetch failed; the installed snapshot is untouched.
    Failed { error: FetchError, retry_in: Duration },
}

/// Cheap handle for poking a running scheduler from elsewhere.
#[derive(Clone)]
pub struct RefreshHandle {
    trigger: Arc<Notify>,
    status: Arc<SchedulerStatus>,
}

impl RefreshHandle {
    /// Wake the refresh loop now instead of at the next interval.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    pub fn status(&self) -> &SchedulerStatus {
        &self.status
    }
}

/// Polls a [`ConfigFetcher`] and installs what it returns into a [`ConfigStore`].
pub struct RefreshScheduler<F> {
    fetcher: F,
    store: Arc<ConfigStore>,
    interval: Duration,
    request_timeout: Duration,
    backoff: BackoffPolicy,
    cache: Option<SnapshotCache>,
    status: Arc<SchedulerStatus>,
    trigger: Arc<Notify>,
    last_delay: Duration,
}

impl<F: ConfigFetcher> RefreshScheduler<F> {
    pub fn new(fetcher: F, store: Arc<ConfigStore>, config: &RefreshConfig) -> Self {
        Self {
            fetcher,
            store,
            interval: config.interval(),
            request_timeout: config.request_timeout(),
            backoff: BackoffPolicy::from_config(config),
            cache: None,
            status: Arc::new(SchedulerStatus::new()),
            trigger: Arc::new(Notify::new()),
            last_delay: Duration::ZERO,
        }
    }

    /// Persist every applied snapshot to `cache` and fall back to it on cold start.
    pub fn with_cache(mut self, cache: SnapshotCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn handle(&self) -> RefreshHandle {
        RefreshHandle {
            trigger: self.trigger.clone(),
            status: self.status.clone(),
        }
    }

    pub fn status(&self) -> Arc<SchedulerStatus> {
        self.status.clone()
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Startup fetch.
    ///
    /// With `fail_fast` a failed fetch is returned as an error. Otherwise the
    /// last-known-good snapshot (if any) is installed and the failure is
    /// reported as [`RefreshOutcome::Failed`]; the loop keeps retrying.
    pub async fn initial_load(&mut self, fail_fast: bool) -> Result<RefreshOutcome, FetchError> {
        let outcome = self.poll_once().await;

        if let RefreshOutcome::Failed { error, .. } = &outcome {
            if fail_fast {
                return Err(error.clone());
            }
            if self.store.read().is_initial() {
                self.restore_from_cache();
            }
        }
        Ok(outcome)
    }

    fn restore_from_cache(&self) {
        let Some(cache) = &self.cache else {
            tracing::warn!(
                "Configuration service unavailable and no snapshot cache configured; starting empty"
            );
            return;
        };

        match cache.load() {
            Ok(Some(snapshot)) => {
                tracing::warn!(
                    version = %snapshot.version(),
                    path = %cache.path().display(),
                    "Configuration service unavailable; serving last-known-good snapshot"
                );
                self.store.swap(snapshot);
            }
            Ok(None) => {
                tracing::warn!(
                    path = %cache.path().display(),
                    "No cached snapshot; starting empty"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read snapshot cache; starting empty");
            }
        }
    }

    /// One `Fetching → (Applying | Backoff)` cycle.
    pub async fn poll_once(&mut self) -> RefreshOutcome {
        self.status.set_state(RefreshState::Fetching);

        let current = self.store.read();
        let last_version = (!current.is_initial()).then(|| current.version().to_owned());
        let start = Instant::now();

        let fetch = self.fetcher.fetch(last_version.as_deref());
        let result = match time::timeout(self.request_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.request_timeout)),
        };

        match result {
            Ok(FetchOutcome::Unchanged) => {
                metrics::record_fetch("unchanged", start);
                self.on_success();
                self.status.set_state(RefreshState::Idle);
                tracing::debug!(version = ?last_version, "Configuration unchanged");
                RefreshOutcome::Unchanged
            }
            Ok(FetchOutcome::Updated(snapshot)) => {
                metrics::record_fetch("updated", start);
                self.status.set_state(RefreshState::Applying);

                let version = snapshot.version().to_owned();
                let changed_keys = match self.store.swap(snapshot) {
                    SwapOutcome::Applied { changed_keys } => changed_keys,
                    SwapOutcome::VersionOnly | SwapOutcome::Unchanged => Vec::new(),
                };
                self.persist();
                self.on_success();
                self.status.set_state(RefreshState::Idle);

                RefreshOutcome::Applied { version, changed_keys }
            }
            Err(error) => {
                metrics::record_fetch(error.kind(), start);
                self.status.set_state(RefreshState::Backoff);

                let failures = self.status.record_failure(error.to_string());
                let retry_in = self.backoff.delay(failures, error.class()).max(self.last_delay);
                self.last_delay = retry_in;
                self.status.set_backoff(retry_in);
                metrics::record_backoff(failures, retry_in);

                match error.class() {
                    FailureClass::Transient => tracing::warn!(
                        error = %error,
                        consecutive_failures = failures,
                        retry_in = ?retry_in,
                        "Configuration fetch failed; keeping current snapshot"
                    ),
                    FailureClass::Persistent => tracing::error!(
                        error = %error,
                        consecutive_failures = failures,
                        retry_in = ?retry_in,
                        "Configuration service rejected the request; keeping current snapshot"
                    ),
                }

                RefreshOutcome::Failed { error, retry_in }
            }
        }
    }

    /// Run until `shutdown` fires (or its sender is dropped).
    ///
    /// The shutdown signal is only observed between polls, so an in-flight
    /// fetch always completes or hits its request timeout first.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.interval,
            request_timeout = ?self.request_timeout,
            "Refresh scheduler starting"
        );

        let mut delay = match self.status.state() {
            RefreshState::Backoff => self.status.current_backoff(),
            _ => self.interval,
        };

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Refresh scheduler received shutdown signal, exiting loop");
                    break;
                }
                _ = self.trigger.notified() => {
                    tracing::info!("Manual refresh triggered");
                }
                _ = time::sleep(delay) => {}
            }

            delay = match self.poll_once().await {
                RefreshOutcome::Failed { retry_in, .. } => retry_in,
                _ => self.interval,
            };
        }

        self.status.set_state(RefreshState::Stopped);
    }

    fn on_success(&mut self) {
        let failures = self.status.consecutive_failures();
        if failures > 0 {
            tracing::info!(consecutive_failures = failures, "Configuration service recovered");
            metrics::record_recovered();
        }
        self.last_delay = Duration::ZERO;
        self.status.record_success();
    }

    fn persist(&self) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save(&self.store.read()) {
                tracing::warn!(error = %e, "Failed to persist snapshot cache");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;

    use crate::store::ConfigSnapshot;

    type Step = Result<FetchOutcome, FetchError>;

    /// Replays a fixed script of fetch results, then reports Unchanged.
    struct ScriptedFetcher {
        steps: Mutex<VecDeque<Step>>,
        seen_versions: Arc<Mutex<Vec<Option<String>>>>,
    }

    impl ScriptedFetcher {
        fn new(steps: Vec<Step>) -> (Self, Arc<Mutex<Vec<Option<String>>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    steps: Mutex::new(steps.into()),
                    seen_versions: seen.clone(),
                },
                seen,
            )
        }
    }

    impl ConfigFetcher for ScriptedFetcher {
        async fn fetch(&self, last_version: Option<&str>) -> Result<FetchOutcome, FetchError> {
            self.seen_versions
                .lock()
                .unwrap()
                .push(last_version.map(str::to_owned));
            self.steps
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(FetchOutcome::Unchanged))
        }
    }

    /// Never answers.
    struct HangingFetcher;

    impl ConfigFetcher for HangingFetcher {
        async fn fetch(&self, _last_version: Option<&str>) -> Result<FetchOutcome, FetchError> {
            std::future::pending().await
        }
    }

    fn updated(message: &str, version: &str) -> Step {
        let mut values = BTreeMap::new();
        values.insert("message".to_string(), message.to_string());
        Ok(FetchOutcome::Updated(ConfigSnapshot::new(values, version)))
    }

    fn config() -> RefreshConfig {
        RefreshConfig {
            interval_secs: 30,
            request_timeout_ms: 1_000,
            base_backoff_ms: 100,
            max_backoff_ms: 1_600,
            error_backoff_multiplier: 4,
            jitter: false,
            fail_fast: false,
        }
    }

    #[tokio::test]
    async fn test_sends_current_version() {
        let (fetcher, seen) =
            ScriptedFetcher::new(vec![updated("hello", "v1"), Ok(FetchOutcome::Unchanged)]);
        let store = Arc::new(ConfigStore::default());
        let mut scheduler = RefreshScheduler::new(fetcher, store.clone(), &config());

        let outcome = scheduler.poll_once().await;
        assert_eq!(
            outcome,
            RefreshOutcome::Applied {
                version: "v1".to_string(),
                changed_keys: vec!["message".to_string()]
            }
        );
        assert_eq!(scheduler.poll_once().await, RefreshOutcome::Unchanged);

        assert_eq!(*seen.lock().unwrap(), vec![None, Some("v1".to_string())]);
        assert_eq!(scheduler.status().state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_fetch_error_keeps_snapshot() {
        let (fetcher, _) = ScriptedFetcher::new(vec![
            updated("hello", "v1"),
            Err(FetchError::Network("connection refused".into())),
            Err(FetchError::InvalidResponse("truncated".into())),
        ]);
        let store = Arc::new(ConfigStore::default());
        let mut scheduler = RefreshScheduler::new(fetcher, store.clone(), &config());

        scheduler.poll_once().await;
        let before = store.read();

        for _ in 0..2 {
            assert!(matches!(scheduler.poll_once().await, RefreshOutcome::Failed { .. }));
            assert_eq!(*store.read(), *before);
        }
        assert_eq!(scheduler.status().consecutive_failures(), 2);
        assert_eq!(scheduler.status().state(), RefreshState::Backoff);
    }

    #[tokio::test]
    async fn test_backoff_never_decreases_across_mixed_failures() {
        let (fetcher, _) = ScriptedFetcher::new(vec![
            Err(FetchError::Unauthorized(401)),
            Err(FetchError::Network("reset".into())),
            Err(FetchError::Network("reset".into())),
            Err(FetchError::Network("reset".into())),
            Err(FetchError::InvalidResponse("bad".into())),
            Err(FetchError::Network("reset".into())),
            Err(FetchError::Network("reset".into())),
        ]);
        let mut scheduler =
            RefreshScheduler::new(fetcher, Arc::new(ConfigStore::default()), &config());

        let mut delays = Vec::new();
        for _ in 0..7 {
            match scheduler.poll_once().await {
                RefreshOutcome::Failed { retry_in, .. } => delays.push(retry_in.as_millis()),
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        // 400 (persistent), 400 (transient 200 held up), 400, 800, 1600 (cap), 1600, 1600
        assert_eq!(delays, vec![400, 400, 400, 800, 1600, 1600, 1600]);

        // Success resets the ladder.
        assert_eq!(scheduler.poll_once().await, RefreshOutcome::Unchanged);
        assert_eq!(scheduler.status().consecutive_failures(), 0);
        assert_eq!(scheduler.status().current_backoff(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_fetch_times_out() {
        let store = Arc::new(ConfigStore::default());
        let mut scheduler = RefreshScheduler::new(HangingFetcher, store.clone(), &config());

        match scheduler.poll_once().await {
            RefreshOutcome::Failed { error, .. } => {
                assert_eq!(error, FetchError::Timeout(Duration::from_millis(1_000)))
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(store.read().is_initial());
    }

    #[tokio::test]
    async fn test_initial_load_fail_fast() {
        let (fetcher, _) = ScriptedFetcher::new(vec![Err(FetchError::Unauthorized(403))]);
        let mut scheduler =
            RefreshScheduler::new(fetcher, Arc::new(ConfigStore::default()), &config());

        let err = scheduler.initial_load(true).await.unwrap_err();
        assert_eq!(err, FetchError::Unauthorized(403));
    }

    #[tokio::test]
    async fn test_cold_start_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path().join("snapshot.json"));

        // First process: applies and persists v1.
        {
            let (fetcher, _) = ScriptedFetcher::new(vec![updated("hello", "v1")]);
            let mut scheduler =
                RefreshScheduler::new(fetcher, Arc::new(ConfigStore::default()), &config())
                    .with_cache(cache.clone());
            scheduler.initial_load(false).await.unwrap();
        }

        // Second process: service down.
        let (fetcher, seen) =
            ScriptedFetcher::new(vec![Err(FetchError::Network("refused".into()))]);
        let store = Arc::new(ConfigStore::default());
        let mut scheduler =
            RefreshScheduler::new(fetcher, store.clone(), &config()).with_cache(cache);

        let outcome = scheduler.initial_load(false).await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Failed { .. }));
        assert_eq!(store.get("message").as_deref(), Some("hello"));
        assert_eq!(store.version(), "v1");

        // Next poll advertises the restored version.
        scheduler.poll_once().await;
        assert_eq!(seen.lock().unwrap().last().cloned().flatten().as_deref(), Some("v1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let (fetcher, seen) = ScriptedFetcher::new(vec![updated("hello", "v1")]);
        let store = Arc::new(ConfigStore::default());
        let scheduler = RefreshScheduler::new(fetcher, store.clone(), &config());
        let status = scheduler.status();

        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(scheduler.run(rx));

        // Two intervals elapse: two polls.
        time::sleep(Duration::from_secs(61)).await;
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(store.get("message").as_deref(), Some("hello"));

        tx.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(status.state(), RefreshState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_trigger_polls_immediately() {
        let (fetcher, seen) = ScriptedFetcher::new(vec![updated("hello", "v1")]);
        let store = Arc::new(ConfigStore::default());
        let scheduler = RefreshScheduler::new(fetcher, store.clone(), &config());
        let handle = scheduler.handle();

        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(scheduler.run(rx));

        handle.trigger();
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(store.get("message").as_deref(), Some("hello"));
        assert_eq!(handle.status().state(), RefreshState::Idle);

        drop(tx);
        task.await.unwrap();
    }
}
