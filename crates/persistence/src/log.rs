//! LogPersister - logs captures instead of writing them
//!
//! Used in tests and dry runs.

use contracts::{BundleSink, MatchedBundle, SyncError, TriggerTicket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Persister that only logs capture summaries
pub struct LogPersister {
    name: String,
    persisted: Arc<AtomicU64>,
}

impl LogPersister {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persisted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared counter of persisted captures.
    pub fn counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.persisted)
    }
}

impl BundleSink for LogPersister {
    fn name(&self) -> &str {
        &self.name
    }

    async fn persist(
        &mut self,
        bundle: &MatchedBundle,
        ticket: &TriggerTicket,
    ) -> Result<(), SyncError> {
        self.persisted.fetch_add(1, Ordering::Relaxed);
        info!(
            persister = %self.name,
            leader_ts_ns = ticket.leader_ts_ns,
            local_ts_ns = bundle.sensor_timestamp_ns(),
            goal_leader_ns = ticket.goal_leader_ns,
            images = bundle.live_count(),
            dropped = bundle.dropped_streams.len(),
            "capture persisted"
        );
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SyncError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SyncError> {
        Ok(())
    }
}
