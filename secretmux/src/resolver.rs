//! Refresh orchestration and merged-view publication
//!
//! The resolver owns the configured sources, drives refresh cycles (on
//! demand and on a schedule), and serves lookups from the most recently
//! published view. A failed cycle never takes the previous view away.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::merge::{merge, MergedEntry, MergedView};
use crate::source::{FetchOutcome, RawSecret, SourceDescriptor};
use crate::transport::Transport;

/// Per-source failure surfaced by a refresh cycle.
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub source_id: String,
    pub error: Error,
}

/// Summary of one completed refresh cycle.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    /// Sources that contributed to the merged view.
    pub succeeded: usize,
    /// Sources that failed this cycle. Never fatal while at least one
    /// source succeeds.
    pub failures: Vec<SourceFailure>,
    /// Resolved keys published.
    pub keys: usize,
    /// Real collisions recorded by the merge.
    pub collisions: usize,
}

/// Aggregates secret sources into one atomically published view.
///
/// Lifecycle: unpopulated until the first successful refresh, then
/// populated for good. Later failures retain the stale view and surface
/// an error instead. There is no terminal state; the resolver serves
/// lookups until dropped or its periodic task is shut down.
pub struct Resolver {
    config: ResolverConfig,
    fetcher: Fetcher,
    /// The only shared mutable state. Written exactly once per successful
    /// cycle, with a fully built view; readers never see intermediates.
    view: RwLock<Option<Arc<MergedView>>>,
    /// Serializes refresh cycles; two merges never run concurrently.
    refresh_gate: Mutex<()>,
}

impl Resolver {
    /// Build a resolver over `transport`. The configuration is validated
    /// here, once.
    pub fn new(config: ResolverConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::new(transport, config.retry.clone());
        Ok(Self {
            config,
            fetcher,
            view: RwLock::new(None),
            refresh_gate: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Run one refresh cycle: fetch every source, merge once, publish.
    ///
    /// A call arriving while another cycle is in flight queues behind it.
    /// The cycle runs under the configured deadline; on expiry the
    /// outstanding fetches are cancelled and nothing is merged. The new
    /// view is published only when at least one source succeeded.
    pub async fn refresh(&self) -> Result<RefreshReport> {
        let _gate = self.refresh_gate.lock().await;

        let deadline = Duration::from_secs(self.config.refresh_timeout_secs);
        let outcomes = match timeout(deadline, self.fetch_all()).await {
            Ok(outcomes) => outcomes,
            Err(_) => {
                warn!(
                    timeout_secs = self.config.refresh_timeout_secs,
                    "refresh deadline exceeded, keeping previous view"
                );
                return Err(Error::DeadlineExceeded(self.config.refresh_timeout_secs));
            }
        };

        let mut fetched: Vec<(SourceDescriptor, RawSecret)> = Vec::new();
        let mut failures = Vec::new();
        for (source, outcome) in outcomes {
            let source_id = source.id();
            match outcome.into_result(&source_id) {
                Ok(secret) => {
                    debug!(source = %source_id, keys = secret.data.len(), "source fetched");
                    fetched.push((source, secret));
                }
                Err(err) => {
                    warn!(source = %source_id, error = %err, "source failed this cycle");
                    failures.push(SourceFailure {
                        source_id,
                        error: err,
                    });
                }
            }
        }

        if fetched.is_empty() {
            error!(
                sources = self.config.sources.len(),
                "refresh failed, no source fetched successfully"
            );
            return Err(Error::RefreshFailed(format!(
                "all {} sources failed",
                self.config.sources.len()
            )));
        }

        let view = Arc::new(merge(self.config.policy, self.config.precedence, &fetched));
        let report = RefreshReport {
            succeeded: fetched.len(),
            keys: view.len(),
            collisions: view.real_collision_count(),
            failures,
        };

        *self.view.write().await = Some(view);
        info!(
            sources = report.succeeded,
            failed = report.failures.len(),
            keys = report.keys,
            collisions = report.collisions,
            "published merged view"
        );
        Ok(report)
    }

    /// Fetch every configured source concurrently, bounded by the
    /// configured cap, and wait for every outcome. Results come back in
    /// configuration order so the merge sees the caller's priority order.
    async fn fetch_all(&self) -> Vec<(SourceDescriptor, FetchOutcome)> {
        let limit = self
            .config
            .max_concurrent_fetches
            .min(self.config.sources.len())
            .max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut join_set = JoinSet::new();

        for (index, source) in self.config.sources.iter().cloned().enumerate() {
            let semaphore = semaphore.clone();
            let fetcher = self.fetcher.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                let outcome = fetcher.fetch(&source).await;
                (index, source, outcome)
            });
        }

        let mut slots: Vec<Option<(SourceDescriptor, FetchOutcome)>> =
            (0..self.config.sources.len()).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, source, outcome)) => slots[index] = Some((source, outcome)),
                Err(err) => error!(error = %err, "fetch task failed to complete"),
            }
        }

        // A slot can only stay empty if its task died; the source still
        // owes the merge an outcome.
        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    (
                        self.config.sources[index].clone(),
                        FetchOutcome::Transport {
                            retryable: false,
                            message: "fetch task aborted".to_string(),
                        },
                    )
                })
            })
            .collect()
    }

    /// Look up one resolved key in the current view. Never blocks on an
    /// in-flight refresh.
    pub async fn get(&self, key: &str) -> Result<MergedEntry> {
        let view = self.view.read().await;
        let view = view.as_ref().ok_or(Error::NotReady)?;
        view.get(key)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// The current merged view with its collision report.
    pub async fn snapshot(&self) -> Result<Arc<MergedView>> {
        self.view.read().await.clone().ok_or(Error::NotReady)
    }

    /// Spawn a background task refreshing every `refresh_interval_secs`.
    ///
    /// The first cycle runs immediately. Refresh errors are logged and the
    /// previous view stays servable; the task runs until the returned
    /// handle is shut down.
    pub fn spawn_periodic(self: Arc<Self>) -> Result<RefreshHandle> {
        let interval_secs = self.config.refresh_interval_secs.ok_or_else(|| {
            Error::InvalidConfig("refresh_interval_secs is not set".to_string())
        })?;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let resolver = self;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = resolver.refresh().await {
                            warn!(error = %err, "periodic refresh failed, serving previous view");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("periodic refresh stopped");
                        break;
                    }
                }
            }
        });

        Ok(RefreshHandle { shutdown_tx, task })
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("sources", &self.config.sources.len())
            .field("policy", &self.config.policy)
            .finish()
    }
}

/// Handle to a spawned periodic-refresh task.
pub struct RefreshHandle {
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl RefreshHandle {
    /// Signal the task to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}
