//! Analyzer registry, liveness tracking, and outbound delivery.
//!
//! The pool is the authoritative routing table and the only component that
//! performs outbound HTTP to an analyzer. One reader/writer lock guards list
//! membership, per-entry liveness, and the cached live-weight sum; it is held
//! for O(N) bookkeeping only, never across I/O. Selection paths copy a
//! snapshot under the read lock and release it before any network round trip.
//!
//! Liveness has two writers: a failed forward marks its target not-live, and
//! the periodic prober marks every target according to its `/health` response.
//! The writers race; the next probe or forward corrects any stale verdict
//! within one probe interval plus a round trip.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::{ForwardError, PoolError};
use crate::model::LogBatch;

/// Hard timeout on every outbound request, forwards and probes alike.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// One registered downstream destination.
///
/// Identity is `id`; `url` and `weight` are metadata fixed at registration.
/// `live` is the reachability last observed by a probe or a forward.
#[derive(Debug, Clone)]
pub struct Analyzer {
    pub id: String,
    pub url: String,
    pub weight: f64,
    pub live: bool,
}

/// The slice of pool behavior the dispatch engine depends on.
///
/// The engine never sees the registry itself, only a way to snapshot the live
/// set and to deliver a batch; there is no inverse reference.
#[async_trait]
pub trait AnalyzerSink: Send + Sync {
    /// Independent copy of the currently-live entries.
    fn snapshot_live(&self) -> Vec<Analyzer>;

    /// Delivers one batch to `target`. Success iff the analyzer answered 200.
    async fn forward(&self, target: &Analyzer, batch: &LogBatch) -> Result<(), ForwardError>;
}

#[derive(Debug, Default)]
struct PoolState {
    analyzers: Vec<Analyzer>,
    total_live_weight: f64,
}

impl PoolState {
    fn recompute_live_weight(&mut self) {
        self.total_live_weight = self
            .analyzers
            .iter()
            .filter(|a| a.live)
            .map(|a| a.weight)
            .sum();
    }
}

/// Registry of downstream analyzers plus the shared client used to reach them.
pub struct AnalyzerPool {
    state: RwLock<PoolState>,
    client: reqwest::Client,
    health_check_interval: Duration,
}

impl AnalyzerPool {
    #[must_use]
    pub fn new(health_check_interval: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                error!("POOL | Failed to build HTTP client ({e}), using client defaults");
                reqwest::Client::new()
            });

        Self {
            state: RwLock::new(PoolState::default()),
            client,
            health_check_interval,
        }
    }

    /// Adds a new analyzer, initially live. The facade validates id, url, and
    /// weight before calling; the pool only enforces id uniqueness.
    pub fn register(&self, id: &str, url: &str, weight: f64) -> Result<(), PoolError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.analyzers.iter().any(|a| a.id == id) {
            return Err(PoolError::DuplicateAnalyzer(id.to_string()));
        }

        state.analyzers.push(Analyzer {
            id: id.to_string(),
            url: url.trim_end_matches('/').to_string(),
            weight,
            live: true,
        });
        state.recompute_live_weight();
        debug!("POOL | Registered analyzer {id} at {url} with weight {weight}");
        Ok(())
    }

    /// Removes an analyzer if present; a no-op otherwise. Historical delivery
    /// counts for the id are kept by the metrics layer.
    pub fn deregister(&self, id: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let before = state.analyzers.len();
        state.analyzers.retain(|a| a.id != id);
        if state.analyzers.len() != before {
            state.recompute_live_weight();
            debug!("POOL | Deregistered analyzer {id}");
        }
    }

    /// Flips the liveness flag of `id` and refreshes the live-weight sum.
    pub fn set_live(&self, id: &str, live: bool) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = state.analyzers.iter_mut().find(|a| a.id == id) else {
            return;
        };
        if entry.live != live {
            entry.live = live;
            debug!(
                "POOL | Analyzer {id} is now {}",
                if live { "live" } else { "not live" }
            );
        }
        state.recompute_live_weight();
    }

    /// Sum of weights over the live entries, maintained under the write lock.
    #[must_use]
    pub fn total_live_weight(&self) -> f64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .total_live_weight
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .analyzers
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot_all(&self) -> Vec<Analyzer> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .analyzers
            .clone()
    }

    /// Probes every registered analyzer (live or not) each interval until the
    /// token is cancelled. A 200 from `/health` promotes the entry; any other
    /// status, transport error, or timeout demotes it.
    pub async fn run_health_probes(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.health_check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("POOL | Health prober shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    self.probe_all();
                }
            }
        }
    }

    /// Launches one concurrent probe per entry; the snapshot is taken under
    /// the read lock and each probe runs lock-free.
    fn probe_all(self: &Arc<Self>) {
        for entry in self.snapshot_all() {
            let pool = Arc::clone(self);
            tokio::spawn(async move {
                pool.probe(&entry).await;
            });
        }
    }

    async fn probe(&self, entry: &Analyzer) {
        let url = format!("{}/health", entry.url);
        let live = match self.client.get(&url).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                debug!("POOL | Health probe for {} failed: {e}", entry.id);
                false
            }
        };
        self.set_live(&entry.id, live);
    }
}

#[async_trait]
impl AnalyzerSink for AnalyzerPool {
    fn snapshot_live(&self) -> Vec<Analyzer> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .analyzers
            .iter()
            .filter(|a| a.live)
            .cloned()
            .collect()
    }

    async fn forward(&self, target: &Analyzer, batch: &LogBatch) -> Result<(), ForwardError> {
        let url = format!("{}/analyze", target.url);

        let response = match self.client.post(&url).json(batch).send().await {
            Ok(response) => response,
            Err(source) => {
                // Unreachable analyzer: take it out of rotation until a
                // probe brings it back.
                self.set_live(&target.id, false);
                warn!("POOL | Analyzer {} is unreachable: {source}", target.id);
                return Err(ForwardError::Transport {
                    id: target.id.clone(),
                    source,
                });
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ForwardError::Status {
                id: target.id.clone(),
                status,
            });
        }

        Ok(())
    }
}
