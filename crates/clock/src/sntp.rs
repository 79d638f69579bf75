//! Four-timestamp SNTP offset estimation.
//!
//! The leader drives the exchange:
//!
//! ```text
//! leader  t0 ──────────► client t1
//!                        client t2 ──────────► leader t3
//! ```
//!
//! `t0`, `t3` are in the leader's ticker domain; `t1`, `t2` in the client's.

use contracts::ClockOffset;
use tracing::trace;

/// One completed four-timestamp exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SntpSample {
    pub t0: i64,
    pub t1: i64,
    pub t2: i64,
    pub t3: i64,
}

impl SntpSample {
    /// `((t1 − t0) + (t2 − t3)) / 2`: how far the client's clock runs
    /// ahead of the leader's.
    pub fn offset_ns(&self) -> i64 {
        ((self.t1 - self.t0) + (self.t2 - self.t3)) / 2
    }

    /// Round-trip time with the client's processing gap removed.
    pub fn rtt_ns(&self) -> i64 {
        (self.t3 - self.t0) - (self.t2 - self.t1)
    }

    /// Half the round trip: the error bound of the offset estimate on an
    /// RTT-symmetric channel.
    pub fn error_bound_ns(&self) -> u64 {
        (self.rtt_ns() / 2).max(0) as u64
    }

    /// The offset as installed on the client, following the converter's
    /// `leader = local + offset` convention (the estimate is negated: the
    /// measurement is client-minus-leader).
    pub fn clock_offset(&self) -> ClockOffset {
        ClockOffset::new(-self.offset_ns(), self.error_bound_ns())
    }
}

/// Accumulator for one burst of exchanges, retaining the min-RTT sample.
#[derive(Debug, Default)]
pub struct SntpBurst {
    best: Option<SntpSample>,
    samples: usize,
}

impl SntpBurst {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one exchange into the burst. Samples with a negative round
    /// trip (reordered datagrams) are rejected.
    pub fn add_sample(&mut self, sample: SntpSample) {
        if sample.rtt_ns() < 0 {
            trace!(rtt_ns = sample.rtt_ns(), "rejecting negative-rtt sample");
            return;
        }
        self.samples += 1;
        match self.best {
            Some(best) if best.rtt_ns() <= sample.rtt_ns() => {}
            _ => self.best = Some(sample),
        }
    }

    /// Number of accepted samples.
    pub fn len(&self) -> usize {
        self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    /// The burst result: the installable offset of the min-RTT sample.
    pub fn best_offset(&self) -> Option<ClockOffset> {
        self.best.map(|s| s.clock_offset())
    }

    /// The min-RTT sample itself, for diagnostics.
    pub fn best_sample(&self) -> Option<SntpSample> {
        self.best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Worked example: a client whose clock reads ~1 ms more than the
    /// leader's, 100 ns round trip.
    #[test]
    fn test_sample_fold() {
        let sample = SntpSample {
            t0: 100,
            t1: 1_000_100,
            t2: 1_000_200,
            t3: 300,
        };

        assert_eq!(sample.offset_ns(), 999_950);
        assert_eq!(sample.rtt_ns(), 100);
        assert_eq!(sample.error_bound_ns(), 50);

        // Installed on the client, t1 must map back near the leader's
        // t0..t3 interval.
        let offset = sample.clock_offset();
        let leader_t1 = offset.leader_from_local(sample.t1);
        assert!((100..=300).contains(&leader_t1));
    }

    #[test]
    fn test_symmetric_channel_exact() {
        // Client clock ahead by exactly 500, one-way delay 40 each way.
        let theta = 500;
        let t0 = 10_000;
        let t1 = t0 + 40 + theta;
        let t2 = t1 + 20;
        let t3 = t2 - theta + 40;

        let sample = SntpSample { t0, t1, t2, t3 };
        assert_eq!(sample.offset_ns(), theta);
        assert_eq!(sample.rtt_ns(), 80);
        assert_eq!(sample.clock_offset().offset_ns, -theta);
    }

    /// Under one-way asymmetry the estimate stays within the error bound:
    /// the estimation error is |d1 - d2| / 2 ≤ (d1 + d2) / 2 = rtt / 2.
    #[test]
    fn test_asymmetric_channel_within_bound() {
        let theta = 1_000; // client ahead of leader
        for (d1, d2) in [(10, 90), (90, 10), (50, 50), (1, 200)] {
            let t0 = 5_000;
            let t1 = t0 + d1 + theta;
            let t2 = t1 + 30;
            let t3 = t2 - theta + d2;

            let sample = SntpSample { t0, t1, t2, t3 };
            let estimate_error = (sample.offset_ns() - theta).abs();
            assert!(
                estimate_error <= sample.error_bound_ns() as i64,
                "error {estimate_error} exceeds bound {} for delays ({d1}, {d2})",
                sample.error_bound_ns()
            );
        }
    }

    #[test]
    fn test_burst_keeps_min_rtt() {
        let mut burst = SntpBurst::new();
        burst.add_sample(SntpSample {
            t0: 0,
            t1: 1_000,
            t2: 1_010,
            t3: 500,
        });
        burst.add_sample(SntpSample {
            t0: 0,
            t1: 1_000,
            t2: 1_010,
            t3: 100,
        });
        burst.add_sample(SntpSample {
            t0: 0,
            t1: 1_000,
            t2: 1_010,
            t3: 900,
        });

        assert_eq!(burst.len(), 3);
        let best = burst.best_offset().unwrap();
        // min rtt = (100 - 0) - 10 = 90
        assert_eq!(best.error_bound_ns, 45);
    }

    #[test]
    fn test_burst_rejects_negative_rtt() {
        let mut burst = SntpBurst::new();
        burst.add_sample(SntpSample {
            t0: 100,
            t1: 0,
            t2: 500,
            t3: 110,
        });
        assert!(burst.is_empty());
        assert!(burst.best_offset().is_none());
    }
}
