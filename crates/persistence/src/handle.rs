//! PersistHandle - manages a persister with isolated queue and worker task

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{BundleSink, MatchedBundle, TriggerTicket};

use crate::metrics::PersistMetrics;

/// One queued capture.
pub struct PersistJob {
    pub bundle: MatchedBundle,
    pub ticket: TriggerTicket,
}

/// Called with the bundle once the write finished (or the job was
/// dropped), so the owner can settle buffer accounting.
pub type ReleaseCallback = Arc<dyn Fn(MatchedBundle) + Send + Sync>;

/// Handle to a running persistence worker
pub struct PersistHandle {
    /// Persister name
    name: String,
    /// Channel to send jobs to the worker
    tx: mpsc::Sender<PersistJob>,
    /// Shared metrics
    metrics: Arc<PersistMetrics>,
    /// Release callback, also used when a job never reaches the worker
    on_done: ReleaseCallback,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl PersistHandle {
    /// Create a new PersistHandle and spawn the worker task
    pub fn spawn<S: BundleSink + Send + 'static>(
        sink: S,
        queue_capacity: usize,
        on_done: ReleaseCallback,
    ) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity);
        let metrics = Arc::new(PersistMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();
        let worker_done = Arc::clone(&on_done);

        let worker_handle = tokio::spawn(async move {
            persist_worker(sink, rx, worker_metrics, worker_done, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            on_done,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<PersistMetrics> {
        &self.metrics
    }

    /// Queue a capture for persistence (non-blocking)
    ///
    /// Returns true if queued. On a full or closed queue the capture is
    /// dropped and its buffers are released immediately.
    pub fn try_submit(&self, bundle: MatchedBundle, ticket: TriggerTicket) -> bool {
        match self.tx.try_send(PersistJob { bundle, ticket }) {
            Ok(()) => {
                self.metrics.set_queue_len(self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.metrics.inc_dropped_count();
                warn!(
                    persister = %self.name,
                    leader_ts_ns = job.ticket.leader_ts_ns,
                    "queue full, capture dropped"
                );
                (self.on_done)(job.bundle);
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                error!(persister = %self.name, "persist worker closed unexpectedly");
                (self.on_done)(job.bundle);
                false
            }
        }
    }

    /// Shutdown the worker gracefully
    #[instrument(name = "persist_handle_shutdown", skip(self))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        // Wait for worker to finish
        if let Err(e) = self.worker_handle.await {
            error!(persister = %self.name, error = ?e, "worker task panicked");
        }
        debug!(persister = %self.name, "persist handle shutdown complete");
    }
}

/// Worker task that consumes jobs and writes through the sink
#[instrument(
    name = "persist_worker_loop",
    skip(sink, rx, metrics, on_done),
    fields(persister = %name)
)]
async fn persist_worker<S: BundleSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<PersistJob>,
    metrics: Arc<PersistMetrics>,
    on_done: ReleaseCallback,
    name: String,
) {
    debug!(persister = %name, "persist worker started");

    while let Some(job) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.persist(&job.bundle, &job.ticket).await {
            Ok(()) => {
                metrics.inc_write_count();
            }
            Err(e) => {
                metrics.inc_failure_count();
                error!(
                    persister = %name,
                    leader_ts_ns = job.ticket.leader_ts_ns,
                    error = %e,
                    "persist failed"
                );
                // Continue processing - don't crash on single failure
            }
        }
        on_done(job.bundle);
    }

    // Cleanup
    if let Err(e) = sink.flush().await {
        error!(persister = %name, error = %e, "flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(persister = %name, error = %e, "close failed on shutdown");
    }

    debug!(persister = %name, "persist worker stopped");
}
