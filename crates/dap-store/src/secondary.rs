use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::metrics::StoreMetrics;
use crate::traits::{PrecomputedKeyStore, Store};

/// A pending replication of one blob to every cache target.
#[derive(Clone, Debug)]
pub struct WriteJob {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub enqueued_at: Instant,
}

impl WriteJob {
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            key,
            value,
            enqueued_at: Instant::now(),
        }
    }
}

/// Outcome of [`SecondaryRouter::enqueue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enqueued {
    /// Admitted; a worker will replicate it.
    Admitted,
    /// The queue was full and the job was dropped.
    QueueFull,
    /// The router is shutting down; the job was rejected.
    ShutDown,
}

/// Which secondary list a read consults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetRole {
    Cache,
    Fallback,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondaryConfig {
    /// Number of replication workers. Zero replicates inline on the write path.
    pub async_put_workers: usize,
    /// Bound of the replication queue; a full queue drops new jobs.
    pub queue_capacity: usize,
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            async_put_workers: 1,
            queue_capacity: 1024,
        }
    }
}

/// Routes reads and writes to secondary backends.
///
/// Cache targets receive best-effort, at-most-once copies of every write
/// through a bounded queue drained by a fixed worker group. Fallback targets
/// are written synchronously and consulted in order when the primary cannot
/// serve a read. Both lists are fixed at construction.
pub struct SecondaryRouter {
    caches: Vec<Arc<dyn PrecomputedKeyStore>>,
    fallbacks: Vec<Arc<dyn PrecomputedKeyStore>>,
    config: SecondaryConfig,
    sender: mpsc::Sender<WriteJob>,
    receiver: Mutex<mpsc::Receiver<WriteJob>>,
    /// Admitted jobs not yet replicated or discarded.
    outstanding: AtomicUsize,
    idle: Notify,
    shutdown: CancellationToken,
    workers: TaskTracker,
    metrics: Arc<StoreMetrics>,
}

impl SecondaryRouter {
    pub fn new(
        caches: Vec<Arc<dyn PrecomputedKeyStore>>,
        fallbacks: Vec<Arc<dyn PrecomputedKeyStore>>,
        config: SecondaryConfig,
        metrics: Arc<StoreMetrics>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        Self {
            caches,
            fallbacks,
            config,
            sender,
            receiver: Mutex::new(receiver),
            outstanding: AtomicUsize::new(0),
            idle: Notify::new(),
            shutdown: CancellationToken::new(),
            workers: TaskTracker::new(),
            metrics,
        }
    }

    /// A router with no targets.
    pub fn disabled(metrics: Arc<StoreMetrics>) -> Self {
        Self::new(Vec::new(), Vec::new(), SecondaryConfig::default(), metrics)
    }

    /// `true` if any cache or fallback target is configured.
    pub fn enabled(&self) -> bool {
        self.caching_enabled() || self.fallback_enabled()
    }

    pub fn caching_enabled(&self) -> bool {
        !self.caches.is_empty()
    }

    pub fn fallback_enabled(&self) -> bool {
        !self.fallbacks.is_empty()
    }

    /// `true` when cache replication runs on worker tasks rather than inline.
    pub fn is_async(&self) -> bool {
        self.config.async_put_workers > 0
    }

    pub fn caches(&self) -> &[Arc<dyn PrecomputedKeyStore>] {
        &self.caches
    }

    pub fn fallbacks(&self) -> &[Arc<dyn PrecomputedKeyStore>] {
        &self.fallbacks
    }

    pub fn config(&self) -> &SecondaryConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<StoreMetrics> {
        &self.metrics
    }

    /// Jobs admitted but not yet picked up by a worker.
    pub fn pending(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Admit a job without ever waiting for queue space.
    pub fn enqueue(&self, job: WriteJob) -> Enqueued {
        if self.shutdown.is_cancelled() {
            return Enqueued::ShutDown;
        }
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        match self.sender.try_send(job) {
            Ok(()) => {
                self.metrics.record_replication_enqueued();
                Enqueued::Admitted
            }
            Err(e) => {
                self.settle(1);
                match e {
                    mpsc::error::TrySendError::Full(_) => {
                        self.metrics.record_replication_dropped();
                        Enqueued::QueueFull
                    }
                    mpsc::error::TrySendError::Closed(_) => Enqueued::ShutDown,
                }
            }
        }
    }

    /// Spawn the worker group. Only call once, and only when [`Self::enabled`].
    pub fn start(self: &Arc<Self>) {
        info!(
            workers = self.config.async_put_workers,
            caches = self.caches.len(),
            fallbacks = self.fallbacks.len(),
            "starting secondary write workers"
        );
        for id in 0..self.config.async_put_workers {
            let router = Arc::clone(self);
            self.workers.spawn(async move { router.worker_loop(id).await });
        }
        self.workers.close();
    }

    /// Cancel the workers and wait for them to exit. A job a worker already
    /// dequeued finishes its target writes; queued jobs are discarded and
    /// counted as dropped.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.workers.close();
        self.workers.wait().await;

        let mut rx = self.receiver.lock().await;
        rx.close();
        let mut discarded = 0;
        while rx.try_recv().is_ok() {
            self.metrics.record_replication_dropped();
            discarded += 1;
        }
        self.settle(discarded);
        debug!(discarded, "secondary workers stopped");
    }

    /// Wait until every admitted job has been replicated or discarded.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.outstanding.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Retire `n` admitted jobs, waking idle waiters at zero.
    fn settle(&self, n: usize) {
        if n > 0 && self.outstanding.fetch_sub(n, Ordering::AcqRel) == n {
            self.idle.notify_waiters();
        }
    }

    async fn worker_loop(&self, id: usize) {
        debug!(worker = id, "secondary worker started");
        loop {
            let job = {
                let mut rx = self.receiver.lock().await;
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => None,
                    job = rx.recv() => job,
                }
            };
            let Some(job) = job else { break };
            self.replicate(&job).await;
            self.settle(1);
        }
        debug!(worker = id, "secondary worker stopped");
    }

    /// Write `job` to every cache target. Failures are counted and never
    /// retried.
    pub async fn replicate(&self, job: &WriteJob) {
        for target in &self.caches {
            match target.put(&job.key, &job.value).await {
                Ok(()) => self.metrics.record_replication_write(),
                Err(e) => {
                    self.metrics.record_replication_failure();
                    warn!(
                        target = %target.backend_type(),
                        key = %hex::encode(&job.key),
                        error = %e,
                        "cache replication failed"
                    );
                }
            }
        }
        debug!(
            key = %hex::encode(&job.key),
            queued_for = ?job.enqueued_at.elapsed(),
            "replicated to cache targets"
        );
    }

    /// Write synchronously to every fallback target. Returns how many writes
    /// failed; failures never surface to the caller.
    pub async fn write_fallbacks(&self, key: &[u8], value: &[u8]) -> usize {
        let mut failures = 0;
        for target in &self.fallbacks {
            if let Err(e) = target.put(key, value).await {
                failures += 1;
                self.metrics.record_fallback_write_failure();
                warn!(
                    target = %target.backend_type(),
                    key = %hex::encode(key),
                    error = %e,
                    "fallback write failed"
                );
            }
        }
        failures
    }

    /// Read `key` from the `role` targets in configured order, returning the
    /// first value that passes `verifier`. A failed verification counts as a
    /// miss and the payload is discarded.
    pub async fn multi_source_read<V>(
        &self,
        key: &[u8],
        role: TargetRole,
        verifier: &V,
    ) -> StoreResult<Vec<u8>>
    where
        V: Store + ?Sized,
    {
        let targets = match role {
            TargetRole::Cache => &self.caches,
            TargetRole::Fallback => &self.fallbacks,
        };
        let mut causes = Vec::new();
        for target in targets {
            let backend = target.backend_type();
            let value = match target.get(key).await {
                Ok(value) => value,
                Err(e) => {
                    push_cause(&mut causes, format!("{backend}: {e}"));
                    continue;
                }
            };
            match verifier.verify(key, &value).await {
                Ok(()) => return Ok(value),
                Err(e) => {
                    self.metrics.record_verification_failure();
                    warn!(target = %backend, key = %hex::encode(key), error = %e, "secondary value failed verification");
                    push_cause(&mut causes, format!("{backend}: {e}"));
                }
            }
        }
        Err(StoreError::NotFound {
            key: hex::encode(key),
            causes,
        })
    }
}

pub(crate) fn push_cause(causes: &mut Vec<String>, cause: String) {
    if !causes.contains(&cause) {
        causes.push(cause);
    }
}

impl std::fmt::Debug for SecondaryRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecondaryRouter")
            .field("caches", &self.caches.len())
            .field("fallbacks", &self.fallbacks.len())
            .field("config", &self.config)
            .field("pending", &self.pending())
            .finish()
    }
}
