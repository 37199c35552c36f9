//! Buffered batch-commit aggregation.
//!
//! `record` folds samples into an in-memory [`StagingBuffer`]. The first
//! sample after the buffer empties arms a one-shot timer; when it fires the
//! whole map is swapped out and committed as commuting increments
//! (`HINCRBY` count, `HINCRBYFLOAT` total) so concurrent writers, even in
//! other processes, never lose updates. Averages are derived as
//! `total / count` at read time; the ranked score written after each commit
//! is only an index for top-N retrieval.
//!
//! Once a batch has been swapped out it is committed by a spawned task that
//! owns the flush lock, so dropping the caller of [`Aggregator::flush_now`]
//! never abandons half a batch. Unflushed samples are lost on a crash,
//! bounded by one flush interval.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{watch, Notify, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::buffer::{RouteTally, StagedBatch, StagingBuffer};
use super::Sample;
use crate::error::StoreError;
use crate::store::{AggregateStore, Keys};

/// Default delay between the first staged sample and its flush.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(5000);

/// Outcome of one flush cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlushStats {
    /// Routes whose deltas were fully committed
    pub routes: usize,
    /// Samples whose count increment was committed
    pub samples: u64,
    /// Routes with at least one increment put back for retry, or lost to a
    /// panicked commit
    pub failed_routes: usize,
    pub oldest_sample: Option<DateTime<Utc>>,
}

struct FlushTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the staging buffer, the flush timer and the commit algorithm.
///
/// Each instance is independent; nothing is process-global.
pub struct Aggregator {
    store: Arc<dyn AggregateStore>,
    keys: Arc<Keys>,
    flush_interval: Duration,
    buffer: Arc<StagingBuffer>,
    /// Signalled when the buffer goes from idle to armed
    wake: Arc<Notify>,
    /// Serializes flushes and clears; held by the commit task until the
    /// whole batch is settled
    flush_lock: Arc<tokio::sync::Mutex<()>>,
    task: Mutex<Option<FlushTask>>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn AggregateStore>, keys: Keys, flush_interval: Duration) -> Self {
        Self {
            store,
            keys: Arc::new(keys),
            flush_interval,
            buffer: Arc::new(StagingBuffer::new()),
            wake: Arc::new(Notify::new()),
            flush_lock: Arc::new(tokio::sync::Mutex::new(())),
            task: Mutex::new(None),
        }
    }

    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    pub fn store(&self) -> &Arc<dyn AggregateStore> {
        &self.store
    }

    /// Number of routes staged but not yet committed.
    pub fn pending_routes(&self) -> usize {
        self.buffer.len()
    }

    /// Spawn the flush timer task. Calling it on a running aggregator is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let (shutdown, rx) = watch::channel(false);
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run(rx).await });
        *task = Some(FlushTask { shutdown, handle });

        info!(
            interval_ms = self.flush_interval.as_millis() as u64,
            "latency aggregator started"
        );
    }

    /// Stop the timer task and commit everything still staged.
    pub async fn stop(&self) -> Result<FlushStats, StoreError> {
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.shutdown.send(true);
            // Ignore JoinError; the task may have already finished
            let _ = task.handle.await;
        }

        let stats = self.flush_now().await?;
        info!(
            routes = stats.routes,
            samples = stats.samples,
            failed_routes = stats.failed_routes,
            "latency aggregator stopped"
        );
        Ok(stats)
    }

    /// Fire-and-forget entry point for the instrumentation hook.
    /// Invalid samples are logged and dropped; nothing here can fail the caller.
    pub fn record(&self, route: impl Into<String>, latency_ms: f64) {
        match Sample::new(route, latency_ms) {
            Ok(sample) => self.record_sample(sample),
            Err(e) => warn!(error = %e, latency_ms, "dropping latency sample"),
        }
    }

    pub fn record_sample(&self, sample: Sample) {
        if self.buffer.stage(sample) {
            self.wake.notify_one();
        }
    }

    /// Commit the staged map immediately.
    ///
    /// Routes are committed in parallel. Increments that fail are merged back
    /// into the buffer and retried on the next flush; the error is only
    /// returned when every route in the batch failed.
    ///
    /// Cancel-safe: the batch is settled by a spawned task, so dropping this
    /// future only stops waiting for the stats.
    pub async fn flush_now(&self) -> Result<FlushStats, StoreError> {
        let guard = Arc::clone(&self.flush_lock).lock_owned().await;

        let batch = self.buffer.take();
        if batch.is_empty() {
            return Ok(FlushStats::default());
        }

        let commit = BatchCommit {
            store: Arc::clone(&self.store),
            keys: Arc::clone(&self.keys),
            buffer: Arc::clone(&self.buffer),
            wake: Arc::clone(&self.wake),
        };
        tokio::spawn(commit.run(batch, guard))
            .await
            .map_err(|e| StoreError::Interrupted(e.to_string()))?
    }

    /// Delete every route aggregate and discard staged samples.
    ///
    /// Runs under the flush lock so an in-flight flush cannot resurrect
    /// cleared routes. Safe to repeat.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let _guard = self.flush_lock.lock().await;
        let discarded = self.buffer.take();
        self.store.delete(&self.keys.route_keys()).await?;
        info!(
            discarded_samples = discarded.sample_count(),
            "latency aggregate cleared"
        );
        Ok(())
    }

    /// Timer loop: wait until armed, sleep one interval, flush.
    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = self.wake.notified() => {}
                _ = shutdown.changed() => break,
            }
            tokio::select! {
                _ = tokio::time::sleep(self.flush_interval) => {}
                _ = shutdown.changed() => break,
            }
            if let Err(e) = self.flush_now().await {
                tracing::error!(error = %e, "latency flush failed");
            }
        }
        debug!("latency flush task exiting");
    }
}

/// Everything a detached flush needs to settle one batch.
struct BatchCommit {
    store: Arc<dyn AggregateStore>,
    keys: Arc<Keys>,
    buffer: Arc<StagingBuffer>,
    wake: Arc<Notify>,
}

impl BatchCommit {
    /// Commit every route of `batch`, restaging what did not land.
    /// `_guard` keeps other flushes and clears out until this returns.
    async fn run(
        self,
        batch: StagedBatch,
        _guard: OwnedMutexGuard<()>,
    ) -> Result<FlushStats, StoreError> {
        let mut stats = FlushStats {
            oldest_sample: batch.oldest,
            ..FlushStats::default()
        };
        let total_routes = batch.routes.len();

        let mut commits = Vec::with_capacity(total_routes);
        for (route, tally) in batch.routes {
            let store = Arc::clone(&self.store);
            let keys = Arc::clone(&self.keys);
            let task_route = route.clone();
            let handle = tokio::spawn(async move {
                commit_route(store.as_ref(), &keys, &task_route, tally).await
            });
            commits.push((route, tally, handle));
        }

        let mut last_error = None;
        for (route, tally, handle) in commits {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Unknown which increments landed; restaging could double count
                    tracing::error!(%route, error = %e, "latency commit task aborted");
                    stats.failed_routes += 1;
                    last_error = Some(StoreError::Interrupted(format!("commit of {route}: {e}")));
                    continue;
                }
            };

            stats.samples += tally.count - outcome.uncommitted.count;
            if outcome.uncommitted.is_empty() {
                stats.routes += 1;
                continue;
            }

            stats.failed_routes += 1;
            warn!(
                %route,
                count = outcome.uncommitted.count,
                total_ms = outcome.uncommitted.total_ms,
                error = ?outcome.error,
                "latency flush incomplete, retrying on next flush"
            );
            if self.buffer.restage(route, outcome.uncommitted) {
                self.wake.notify_one();
            }
            last_error = outcome.error;
        }

        debug!(
            routes = stats.routes,
            samples = stats.samples,
            failed_routes = stats.failed_routes,
            "latency buffer flushed"
        );

        match last_error {
            Some(e) if stats.failed_routes == total_routes => Err(e),
            _ => Ok(stats),
        }
    }
}

/// What one route's commit left behind.
struct RouteCommit {
    uncommitted: RouteTally,
    error: Option<StoreError>,
}

/// Issue the two commuting increments for one route, then refresh its
/// ranking score from the values they returned.
async fn commit_route(
    store: &dyn AggregateStore,
    keys: &Keys,
    route: &str,
    tally: RouteTally,
) -> RouteCommit {
    let (count, total) = tokio::join!(
        store.hash_incr(&keys.counts, route, tally.count as i64),
        store.hash_incr_float(&keys.totals, route, tally.total_ms),
    );

    let mut uncommitted = RouteTally::default();
    let mut error = None;
    let count = count.map_err(|e| {
        uncommitted.count = tally.count;
        error = Some(e);
    });
    let total = total.map_err(|e| {
        uncommitted.total_ms = tally.total_ms;
        error = Some(e);
    });

    if let (Ok(count), Ok(total)) = (count, total) {
        if count > 0 {
            let average = total / count as f64;
            if let Err(e) = store.ranked_set_add(&keys.scores, route, average).await {
                // Stale until this route's next successful commit
                warn!(%route, error = %e, "failed to refresh latency score");
            }
        }
    }

    RouteCommit { uncommitted, error }
}
