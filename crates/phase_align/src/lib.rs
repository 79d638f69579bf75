//! # Phase Align
//!
//! Sensor frame-phase alignment by exposure injection.
//!
//! Each device measures the phase of its sensor frame starts against a
//! shared goal phase and, when out of tolerance, requests a single frame
//! of anomalous exposure that shifts all subsequent frame starts. A damped
//! proportional controller converges geometrically when `step_gain < 1`.

mod controller;
mod law;

pub use controller::{PhaseAlignController, PhaseObserver, PhaseSample};
pub use law::{injection_exposure_ns, phase_error_ns};

// Re-export contracts types
pub use contracts::PhaseConfig;
