//! Bounded ingress, worker pool, retry pacing, and delivery accounting.
//!
//! The engine owns two bounded queues. The ingress queue decouples the HTTP
//! facade from delivery: `enqueue` never blocks, and a full queue is a drop,
//! not backpressure on the caller. The retry queue absorbs transient delivery
//! failures; a single pacer task redispatches from it at a fixed interval so
//! retries cannot busy-spin against a down cluster.
//!
//! Ordering is explicitly not a goal: two batches enqueued in order may be
//! delivered in either order, and retries may land after fresher batches.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::model::LogBatch;
use crate::pool::AnalyzerSink;
use crate::selector;

/// In-memory envelope around a batch while the engine owns it.
///
/// The attempt counter lives here, not in the batch's user-visible metadata
/// map: it is dispatch state, not payload.
#[derive(Debug)]
struct DispatchJob {
    batch: LogBatch,
    attempt: u32,
}

/// Routes enqueued batches to live analyzers via a fixed worker pool.
pub struct DispatchEngine {
    pool: Arc<dyn AnalyzerSink>,
    metrics: Metrics,
    ingress_tx: mpsc::Sender<DispatchJob>,
    /// Workers share one receiver; the lock is only held while waiting for
    /// the next job, never while forwarding.
    ingress_rx: Arc<Mutex<mpsc::Receiver<DispatchJob>>>,
    retry_tx: mpsc::Sender<DispatchJob>,
    /// Taken by the retry pacer at startup.
    retry_rx: Mutex<Option<mpsc::Receiver<DispatchJob>>>,
    workers: usize,
    max_retries: u32,
    retry_interval: Duration,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DispatchEngine {
    /// `config` must have passed [`Config::validate`]: queue capacity and
    /// worker count are both expected to be non-zero.
    #[must_use]
    pub fn new(pool: Arc<dyn AnalyzerSink>, config: &Config) -> Self {
        let (ingress_tx, ingress_rx) = mpsc::channel(config.queue_size);
        let (retry_tx, retry_rx) = mpsc::channel(config.queue_size);

        Self {
            pool,
            metrics: Metrics::default(),
            ingress_tx,
            ingress_rx: Arc::new(Mutex::new(ingress_rx)),
            retry_tx,
            retry_rx: Mutex::new(Some(retry_rx)),
            workers: config.workers,
            max_retries: config.max_retries,
            retry_interval: config.retry_interval,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Admits a batch to the ingress queue without blocking.
    ///
    /// Returns `true` if the batch was admitted (counted as received) and
    /// `false` if the queue was full (counted as dropped). The bound on this
    /// call is independent of analyzer state and downstream latency.
    pub fn enqueue(&self, batch: LogBatch) -> bool {
        match self.ingress_tx.try_send(DispatchJob { batch, attempt: 0 }) {
            Ok(()) => {
                self.metrics.record_received();
                true
            }
            Err(TrySendError::Full(_) | TrySendError::Closed(_)) => {
                self.metrics.record_dropped();
                false
            }
        }
    }

    /// Launches the worker tasks and the retry pacer. Call at most once.
    pub async fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock().await;
        for worker_id in 0..self.workers {
            let engine = Arc::clone(self);
            tasks.push(tokio::spawn(async move {
                engine.worker_loop(worker_id).await;
            }));
        }

        let engine = Arc::clone(self);
        tasks.push(tokio::spawn(async move {
            engine.retry_loop().await;
        }));

        debug!(
            "DISPATCH | Started {} workers and the retry pacer",
            self.workers
        );
    }

    /// Signals shutdown and waits for every spawned task to exit.
    ///
    /// Batches still sitting in either queue are discarded silently; the
    /// engine is not a durable buffer. `enqueue` must not be called after
    /// this returns.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("DISPATCH | Task failed to join cleanly: {e}");
            }
        }
        debug!("DISPATCH | Engine stopped");
    }

    /// Independent copy of the delivery counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize) {
        loop {
            let job = {
                let mut rx = self.ingress_rx.lock().await;
                tokio::select! {
                    () = self.cancel.cancelled() => None,
                    job = rx.recv() => job,
                }
            };

            let Some(job) = job else {
                debug!("DISPATCH | Worker {worker_id} shutting down");
                return;
            };
            self.process(job).await;
        }
    }

    /// Single consumer of the retry queue. Each redispatch waits for one tick
    /// of a fixed-period ticker, pacing the retry stream globally regardless
    /// of how many workers are running.
    async fn retry_loop(self: Arc<Self>) {
        let Some(mut rx) = self.retry_rx.lock().await.take() else {
            return;
        };

        let mut ticker = tokio::time::interval(self.retry_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // discard first tick, which is instantaneous

        loop {
            let job = tokio::select! {
                () = self.cancel.cancelled() => None,
                job = rx.recv() => job,
            };

            let Some(job) = job else {
                debug!("DISPATCH | Retry pacer shutting down");
                return;
            };

            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!("DISPATCH | Retry pacer shutting down");
                    return;
                }
                _ = ticker.tick() => {}
            }

            self.process(job).await;
        }
    }

    /// One delivery attempt: snapshot the live set, pick a target, forward.
    ///
    /// The snapshot may be stale by the time the forward happens; a target
    /// that died in between fails the forward and the batch re-enters via
    /// the retry path. That is the designed recovery route, not an error.
    async fn process(&self, job: DispatchJob) {
        let snapshot = self.pool.snapshot_live();
        let Some(target) = selector::pick(&snapshot) else {
            debug!(
                "DISPATCH | No live analyzers for batch {}",
                job.batch.packet_id
            );
            self.retry_or_drop(job);
            return;
        };

        let result = tokio::select! {
            () = self.cancel.cancelled() => {
                debug!(
                    "DISPATCH | Shutdown during delivery of batch {}",
                    job.batch.packet_id
                );
                return;
            }
            result = self.pool.forward(target, &job.batch) => result,
        };

        match result {
            Ok(()) => self.metrics.record_sent(&target.id),
            Err(e) => {
                debug!(
                    "DISPATCH | Delivery attempt {} for batch {} failed: {e}",
                    job.attempt, job.batch.packet_id
                );
                self.retry_or_drop(job);
            }
        }
    }

    /// Re-enqueues a failed batch with a bumped attempt counter, or drops it
    /// once the retry budget is spent. A full retry queue counts as
    /// exhaustion.
    fn retry_or_drop(&self, job: DispatchJob) {
        if job.attempt >= self.max_retries {
            debug!(
                "DISPATCH | Batch {} dropped after {} attempts",
                job.batch.packet_id,
                job.attempt + 1
            );
            self.metrics.record_dropped();
            return;
        }

        let next = DispatchJob {
            attempt: job.attempt + 1,
            batch: job.batch,
        };
        if let Err(TrySendError::Full(job) | TrySendError::Closed(job)) =
            self.retry_tx.try_send(next)
        {
            debug!(
                "DISPATCH | Retry queue full, dropping batch {}",
                job.batch.packet_id
            );
            self.metrics.record_dropped();
        }
    }
}
