//! The phase control law.

use contracts::PhaseConfig;

/// Signed phase error of a leader-domain frame timestamp against the goal
/// phase, wrapped into `[-P/2, P/2)`.
pub fn phase_error_ns(leader_ts_ns: i64, config: &PhaseConfig) -> i64 {
    let period = config.frame_period_ns;
    let current_phase = leader_ts_ns.rem_euclid(period);
    let raw = current_phase - config.goal_phase_ns;
    (raw + period / 2).rem_euclid(period) - period / 2
}

/// Exposure of the injection frame that cancels `step_gain` of the error.
///
/// A positive error (frames starting late in the period) needs a nearly
/// full-period injection; a negative error needs a short one. The result
/// is clamped to the configured exposure bounds.
pub fn injection_exposure_ns(error_ns: i64, config: &PhaseConfig) -> i64 {
    let correction = (error_ns.abs() as f64 * config.step_gain) as i64;
    let desired = if error_ns > 0 {
        config.frame_period_ns - correction
    } else {
        correction
    };
    desired.clamp(
        config.min_inject_exposure_ns,
        config.max_inject_exposure_ns,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PhaseConfig {
        PhaseConfig {
            frame_period_ns: 33_333_333,
            goal_phase_ns: 0,
            settle_frames: 4,
            tolerance_ns: 100_000,
            min_inject_exposure_ns: 1_000_000,
            max_inject_exposure_ns: 65_000_000,
            step_gain: 0.5,
        }
    }

    #[test]
    fn test_error_is_signed_and_wrapped() {
        let cfg = config();
        let period = cfg.frame_period_ns;

        assert_eq!(phase_error_ns(0, &cfg), 0);
        assert_eq!(phase_error_ns(period, &cfg), 0);
        assert_eq!(phase_error_ns(1_000, &cfg), 1_000);
        // Just under a full period wraps to a small negative error.
        assert_eq!(phase_error_ns(period - 1_000, &cfg), -1_000);
        // The wrap boundary sits at half a period.
        assert_eq!(phase_error_ns(period / 2, &cfg), period / 2);
        assert!(phase_error_ns(period / 2 + 1, &cfg) < 0);
    }

    #[test]
    fn test_error_against_nonzero_goal() {
        let cfg = PhaseConfig {
            goal_phase_ns: 10_000_000,
            ..config()
        };
        assert_eq!(phase_error_ns(10_000_000, &cfg), 0);
        assert_eq!(phase_error_ns(12_000_000, &cfg), 2_000_000);
        assert_eq!(phase_error_ns(8_000_000, &cfg), -2_000_000);
    }

    /// Worked example: period 33,333,333 ns, gain 0.5, error +10 ms.
    #[test]
    fn test_positive_error_injection() {
        let cfg = config();
        let delta = injection_exposure_ns(10_000_000, &cfg);
        assert_eq!(delta, 28_333_333);
    }

    #[test]
    fn test_negative_error_injection() {
        let cfg = config();
        let delta = injection_exposure_ns(-10_000_000, &cfg);
        assert_eq!(delta, 5_000_000);
    }

    #[test]
    fn test_injection_clamped() {
        let cfg = PhaseConfig {
            min_inject_exposure_ns: 6_000_000,
            max_inject_exposure_ns: 20_000_000,
            ..config()
        };
        assert_eq!(injection_exposure_ns(-1_000_000, &cfg), 6_000_000);
        assert_eq!(injection_exposure_ns(2_000_000, &cfg), 20_000_000);
    }
}
