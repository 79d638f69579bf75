//! BundleSink trait - persistence output interface
//!
//! Defines the abstract interface for capture persisters.

use crate::{MatchedBundle, SyncError};

/// Context for one persisted capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerTicket {
    /// The armed goal in the leader domain
    pub goal_leader_ns: i64,

    /// The bundle's sensor timestamp translated into the leader domain
    pub leader_ts_ns: i64,

    /// True when the goal was already in the past at arming time
    /// (insufficient broadcast lead)
    pub lead_underflow: bool,
}

/// Capture persistence trait.
///
/// All persister implementations must implement this trait. The persister
/// reads the bundle's images; buffer accounting is settled by the worker
/// that owns the bundle after `persist` returns.
#[trait_variant::make(BundleSink: Send)]
pub trait LocalBundleSink {
    /// Persister name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one matched bundle
    ///
    /// # Errors
    /// Returns a write error (should include context)
    async fn persist(
        &mut self,
        bundle: &MatchedBundle,
        ticket: &TriggerTicket,
    ) -> Result<(), SyncError>;

    /// Flush buffered output (if any)
    async fn flush(&mut self) -> Result<(), SyncError>;

    /// Close the persister
    async fn close(&mut self) -> Result<(), SyncError>;
}
