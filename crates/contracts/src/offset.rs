//! ClockOffset - local-to-leader clock mapping
//!
//! Produced by the SNTP estimator, installed into the time domain converter.

use serde::{Deserialize, Serialize};

/// A signed clock offset with its error bound.
///
/// `leader_ns ≈ local_ns + offset_ns`, with the true offset within
/// `error_bound_ns` of the estimate for an RTT-symmetric channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockOffset {
    /// Offset in nanoseconds added to local time to reach leader time
    pub offset_ns: i64,

    /// Upper bound on the estimation error (half the best round trip)
    pub error_bound_ns: u64,
}

impl ClockOffset {
    /// The identity mapping used by the leader itself.
    pub const IDENTITY: ClockOffset = ClockOffset {
        offset_ns: 0,
        error_bound_ns: 0,
    };

    pub fn new(offset_ns: i64, error_bound_ns: u64) -> Self {
        Self {
            offset_ns,
            error_bound_ns,
        }
    }

    /// Translate a local timestamp into the leader domain.
    #[inline]
    pub fn leader_from_local(&self, local_ns: i64) -> i64 {
        local_ns + self.offset_ns
    }

    /// Translate a leader-domain timestamp back into the local domain.
    #[inline]
    pub fn local_from_leader(&self, leader_ns: i64) -> i64 {
        leader_ns - self.offset_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let offset = ClockOffset::new(999_950, 50);
        for x in [0i64, 1, -5, 1_000_000_000, i64::MAX / 4] {
            assert_eq!(offset.local_from_leader(offset.leader_from_local(x)), x);
        }
    }

    #[test]
    fn test_identity() {
        assert_eq!(ClockOffset::IDENTITY.leader_from_local(42), 42);
    }
}
