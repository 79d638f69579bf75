//! Time domain conversion between local and leader clocks.

use std::sync::RwLock;

use contracts::{ClockOffset, SyncError};
use tracing::debug;

/// Thread-safe holder of the current clock offset.
///
/// Readers always observe a consistent `(offset, error_bound)` pair. A new
/// offset applies immediately on install; no interpolation across updates
/// (latest wins).
#[derive(Debug)]
pub struct TimeDomainConverter {
    offset: RwLock<Option<ClockOffset>>,
}

impl TimeDomainConverter {
    /// Create an unsynced converter (client initial state).
    pub fn new() -> Self {
        Self {
            offset: RwLock::new(None),
        }
    }

    /// Create a converter pre-loaded with the identity offset (the leader
    /// is its own time reference).
    pub fn leader() -> Self {
        Self {
            offset: RwLock::new(Some(ClockOffset::IDENTITY)),
        }
    }

    /// Install a freshly negotiated offset.
    pub fn install(&self, offset: ClockOffset) {
        debug!(
            offset_ns = offset.offset_ns,
            error_bound_ns = offset.error_bound_ns,
            "clock offset installed"
        );
        *self.offset.write().unwrap() = Some(offset);
    }

    /// The currently installed offset, if any.
    pub fn current(&self) -> Option<ClockOffset> {
        *self.offset.read().unwrap()
    }

    /// Whether an offset has been installed.
    pub fn is_synced(&self) -> bool {
        self.offset.read().unwrap().is_some()
    }

    /// Translate a local timestamp into the leader domain.
    pub fn leader_time_ns(&self, local_ns: i64) -> Result<i64, SyncError> {
        self.offset
            .read()
            .unwrap()
            .map(|o| o.leader_from_local(local_ns))
            .ok_or(SyncError::Unsynced)
    }

    /// Translate a leader-domain timestamp into the local domain.
    pub fn local_time_ns(&self, leader_ns: i64) -> Result<i64, SyncError> {
        self.offset
            .read()
            .unwrap()
            .map(|o| o.local_from_leader(leader_ns))
            .ok_or(SyncError::Unsynced)
    }
}

impl Default for TimeDomainConverter {
    fn default() -> Self {
        Self::new()
    }
}
