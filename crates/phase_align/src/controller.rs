//! Per-device phase alignment controller.

use std::sync::{Arc, Mutex};

use contracts::{CaptureControl, PhaseConfig};
use metrics::{counter, gauge, histogram};
use tracing::{debug, info, instrument, warn};

use crate::law::{injection_exposure_ns, phase_error_ns};

/// One phase measurement, published to observers after every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSample {
    /// Phase of the frame within the period
    pub phase_ns: i64,

    /// Signed error against the goal phase, in `[-P/2, P/2)`
    pub phase_error_ns: i64,

    /// Whether the error is within tolerance
    pub aligned: bool,
}

/// Observer of phase measurements.
pub type PhaseObserver = Arc<dyn Fn(PhaseSample) + Send + Sync>;

#[derive(Debug)]
struct AlignState {
    /// An alignment cycle is running (injections allowed)
    active: bool,
    /// Arrivals to skip before the next measurement acts
    settle_remaining: u32,
}

/// Measures every frame and, during an alignment cycle, injects
/// correction frames until the phase error is within tolerance.
pub struct PhaseAlignController {
    config: PhaseConfig,
    control: Arc<dyn CaptureControl>,
    state: Mutex<AlignState>,
    observers: Mutex<Vec<PhaseObserver>>,
}

impl PhaseAlignController {
    pub fn new(config: PhaseConfig, control: Arc<dyn CaptureControl>) -> Self {
        Self {
            config,
            control,
            state: Mutex::new(AlignState {
                active: false,
                settle_remaining: 0,
            }),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &PhaseConfig {
        &self.config
    }

    /// Register an observer for phase measurements.
    pub fn register_observer(&self, observer: PhaseObserver) {
        self.observers.lock().unwrap().push(observer);
    }

    /// Begin an alignment cycle: subsequent frames may trigger injection
    /// requests until the phase settles within tolerance.
    pub fn start_align(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.active {
            info!("phase alignment cycle started");
            state.active = true;
            state.settle_remaining = 0;
        }
    }

    /// Whether an alignment cycle is currently running.
    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().active
    }

    /// Feed one frame-start timestamp (leader domain). Returns the
    /// measurement taken for it.
    #[instrument(name = "phase_on_frame", skip(self))]
    pub fn on_frame(&self, leader_ts_ns: i64) -> PhaseSample {
        let error = phase_error_ns(leader_ts_ns, &self.config);
        let sample = PhaseSample {
            phase_ns: leader_ts_ns.rem_euclid(self.config.frame_period_ns),
            phase_error_ns: error,
            aligned: error.abs() <= self.config.tolerance_ns,
        };

        gauge!("shutter_sync_phase_error_ns").set(error as f64);
        histogram!("shutter_sync_phase_error_abs_ns").record(error.abs() as f64);

        self.step(sample);
        self.notify(sample);
        sample
    }

    /// Advance the alignment state machine for one measurement.
    fn step(&self, sample: PhaseSample) {
        let mut state = self.state.lock().unwrap();
        if !state.active {
            return;
        }

        if state.settle_remaining > 0 {
            state.settle_remaining -= 1;
            return;
        }

        if sample.aligned {
            info!(
                phase_error_ns = sample.phase_error_ns,
                "phase aligned, cycle complete"
            );
            state.active = false;
            return;
        }

        let exposure_ns = injection_exposure_ns(sample.phase_error_ns, &self.config);
        debug!(
            phase_error_ns = sample.phase_error_ns,
            exposure_ns, "requesting injection frame"
        );
        match self.control.inject_frame(exposure_ns) {
            Ok(()) => {
                counter!("shutter_sync_inject_frames_total").increment(1);
                state.settle_remaining = self.config.settle_frames;
            }
            Err(e) => {
                // The camera refused; retry on the next arrival.
                warn!(error = %e, "injection request failed");
            }
        }
    }

    fn notify(&self, sample: PhaseSample) {
        let observers = self.observers.lock().unwrap();
        for observer in observers.iter() {
            observer(sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SyncError;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Records injection requests; models nothing.
    struct RecordingControl {
        last_exposure: AtomicI64,
        requests: AtomicI64,
    }

    impl RecordingControl {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                last_exposure: AtomicI64::new(0),
                requests: AtomicI64::new(0),
            })
        }
    }

    impl CaptureControl for RecordingControl {
        fn start_preview(&self, _exposure_ns: i64, _sensitivity: i32) -> Result<(), SyncError> {
            Ok(())
        }

        fn inject_frame(&self, exposure_ns: i64) -> Result<(), SyncError> {
            self.last_exposure.store(exposure_ns, Ordering::SeqCst);
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config() -> PhaseConfig {
        PhaseConfig {
            frame_period_ns: 33_333_333,
            goal_phase_ns: 0,
            settle_frames: 2,
            tolerance_ns: 100_000,
            min_inject_exposure_ns: 1_000_000,
            max_inject_exposure_ns: 65_000_000,
            step_gain: 0.5,
        }
    }

    #[test]
    fn test_no_injection_while_inactive() {
        let control = RecordingControl::new();
        let controller = PhaseAlignController::new(config(), control.clone());

        let sample = controller.on_frame(10_000_000);
        assert_eq!(sample.phase_error_ns, 10_000_000);
        assert!(!sample.aligned);
        assert_eq!(control.requests.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_injection_exposure_for_positive_error() {
        let control = RecordingControl::new();
        let controller = PhaseAlignController::new(config(), control.clone());
        controller.start_align();

        controller.on_frame(10_000_000);
        assert_eq!(control.requests.load(Ordering::SeqCst), 1);
        assert_eq!(control.last_exposure.load(Ordering::SeqCst), 28_333_333);
    }

    #[test]
    fn test_settle_frames_skipped() {
        let control = RecordingControl::new();
        let controller = PhaseAlignController::new(config(), control.clone());
        controller.start_align();

        controller.on_frame(10_000_000);
        assert_eq!(control.requests.load(Ordering::SeqCst), 1);

        // Two settle frames: still mis-phased, but no new injection.
        controller.on_frame(43_333_333 + 10_000_000);
        controller.on_frame(76_666_666 + 10_000_000);
        assert_eq!(control.requests.load(Ordering::SeqCst), 1);

        // Third arrival measures again.
        controller.on_frame(110_000_000 + 5_000_000);
        assert_eq!(control.requests.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cycle_ends_when_aligned() {
        let control = RecordingControl::new();
        let controller = PhaseAlignController::new(config(), control.clone());
        controller.start_align();

        let sample = controller.on_frame(33_333_333 * 4 + 50_000);
        assert!(sample.aligned);
        assert!(!controller.is_active());
        assert_eq!(control.requests.load(Ordering::SeqCst), 0);
    }

    /// With a noise-free sensor model, successive errors contract by the
    /// step gain until within tolerance.
    #[test]
    fn test_geometric_convergence() {
        let cfg = config();
        let control = RecordingControl::new();
        let controller = PhaseAlignController::new(cfg.clone(), control.clone());
        controller.start_align();

        // Ideal sensor: an injected exposure delays subsequent frame
        // starts by exactly that exposure.
        let period = cfg.frame_period_ns;
        let mut phase = 12_000_000i64;
        let mut t = phase;
        let mut last_error = phase_error_ns(t, &cfg).abs();

        for _ in 0..40 {
            let before = control.requests.load(Ordering::SeqCst);
            controller.on_frame(t);
            if !controller.is_active() {
                break;
            }
            if control.requests.load(Ordering::SeqCst) > before {
                let injected = control.last_exposure.load(Ordering::SeqCst);
                phase = (phase + injected).rem_euclid(period);
                // Skip the settle window before the controller re-measures.
                for _ in 0..=cfg.settle_frames {
                    t += period;
                }
                t = (t / period) * period + phase;

                let error = phase_error_ns(t, &cfg).abs();
                assert!(
                    error <= last_error / 2 + 1,
                    "error {error} did not contract from {last_error}"
                );
                last_error = error;
            } else {
                t += period;
            }
        }

        assert!(!controller.is_active(), "controller failed to converge");
        assert!(last_error <= cfg.tolerance_ns);
    }

    #[test]
    fn test_observers_see_every_measurement() {
        let control = RecordingControl::new();
        let controller = PhaseAlignController::new(config(), control);

        let seen = Arc::new(AtomicI64::new(0));
        let seen_clone = Arc::clone(&seen);
        controller.register_observer(Arc::new(move |sample: PhaseSample| {
            seen_clone.store(sample.phase_error_ns, Ordering::SeqCst);
        }));

        controller.on_frame(7_000);
        assert_eq!(seen.load(Ordering::SeqCst), 7_000);
    }
}
