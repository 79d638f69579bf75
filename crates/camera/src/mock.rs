//! Mock camera implementation
//!
//! Implements the `FrameSource` and `CaptureControl` traits, generating
//! simulated frames in a background thread. Used for testing and
//! development without camera hardware.
//!
//! The phase model is ideal: an injected frame of exposure δ delays every
//! subsequent frame start by exactly δ, so the alignment controller's
//! geometric convergence is observable end-to-end.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use clock::Ticker;
use contracts::{
    CaptureControl, CaptureRequestTag, FrameMetadata, FrameSource, ImageBuffer, ImageCallback,
    MetadataCallback, SyncError,
};
use tracing::{debug, trace};

/// Mock camera configuration
#[derive(Debug, Clone)]
pub struct MockCameraConfig {
    /// Sensor frame period (nanoseconds)
    pub frame_period_ns: i64,
    /// Number of image streams
    pub streams: usize,
    /// Image width
    pub width: u32,
    /// Image height
    pub height: u32,
    /// Initial sensor phase skew (nanoseconds)
    pub initial_skew_ns: i64,
    /// Wall-clock speedup: sensor timestamps advance one period per
    /// `period / time_scale` of real time
    pub time_scale: f64,
    /// Frames whose image delivery is skipped, as `(stream, sequence_id)`
    pub drops: Vec<(usize, u64)>,
}

impl Default for MockCameraConfig {
    fn default() -> Self {
        Self {
            frame_period_ns: 33_333_333,
            streams: 2,
            width: 320,
            height: 240,
            initial_skew_ns: 0,
            time_scale: 1.0,
            drops: Vec::new(),
        }
    }
}

struct Shared {
    listening: AtomicBool,
    /// Accumulated frame-start shift from consumed injection frames
    phase_shift_ns: AtomicI64,
    /// Injection exposures not yet consumed by the frame loop
    pending_injects: Mutex<VecDeque<i64>>,
    /// Current repeating-preview 2A values
    preview: Mutex<(i64, i32)>,
}

/// Mock camera
///
/// Generates one metadata record per frame and one image buffer per
/// stream (minus the configured drops) at the configured period.
pub struct MockCamera {
    config: MockCameraConfig,
    shared: Arc<Shared>,
}

impl MockCamera {
    pub fn new(config: MockCameraConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                listening: AtomicBool::new(false),
                phase_shift_ns: AtomicI64::new(0),
                pending_injects: Mutex::new(VecDeque::new()),
                preview: Mutex::new((10_000_000, 100)),
            }),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(MockCameraConfig::default())
    }

    /// Current accumulated phase shift (for assertions in tests).
    pub fn phase_shift_ns(&self) -> i64 {
        self.shared.phase_shift_ns.load(Ordering::SeqCst)
    }

    /// Current preview 2A values.
    pub fn preview_2a(&self) -> (i64, i32) {
        *self.shared.preview.lock().unwrap()
    }

    fn make_image(config: &MockCameraConfig, stream: usize, ts: i64) -> ImageBuffer {
        let size = (config.width * config.height) as usize;
        ImageBuffer {
            stream,
            sensor_timestamp_ns: ts,
            width: config.width,
            height: config.height,
            data: Bytes::from(vec![128u8; size]),
        }
    }
}

impl FrameSource for MockCamera {
    fn listen(&self, on_metadata: MetadataCallback, on_image: ImageCallback) {
        // Idempotent: if already listening, don't start again
        if self.shared.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let config = self.config.clone();
        let shared = Arc::clone(&self.shared);
        let drops: HashSet<(usize, u64)> = config.drops.iter().copied().collect();
        let interval = Duration::from_nanos(
            (config.frame_period_ns as f64 / config.time_scale).max(1.0) as u64,
        );

        thread::spawn(move || {
            let base_ns = Ticker::global().now_ns();
            let mut sequence_id: u64 = 0;

            debug!(
                frame_period_ns = config.frame_period_ns,
                streams = config.streams,
                initial_skew_ns = config.initial_skew_ns,
                "mock camera started"
            );

            while shared.listening.load(Ordering::Relaxed) {
                sequence_id += 1;

                // Consume at most one pending injection per frame: the
                // injected frame itself is tagged, and every later frame
                // start is delayed by its exposure.
                let inject = shared.pending_injects.lock().unwrap().pop_front();
                let tag = match inject {
                    Some(exposure_ns) => {
                        shared.phase_shift_ns.fetch_add(exposure_ns, Ordering::SeqCst);
                        CaptureRequestTag::injection(config.streams)
                    }
                    None => CaptureRequestTag::preview(config.streams),
                };

                let shift = shared.phase_shift_ns.load(Ordering::SeqCst);
                let ts = base_ns
                    + config.initial_skew_ns
                    + sequence_id as i64 * config.frame_period_ns
                    + shift;

                on_metadata(FrameMetadata {
                    tag,
                    sensor_timestamp_ns: ts,
                    sequence_id,
                    frame_duration_ns: config.frame_period_ns,
                });

                for stream in 0..config.streams {
                    if drops.contains(&(stream, sequence_id)) {
                        trace!(stream, sequence_id, "mock image dropped");
                        continue;
                    }
                    on_image(Self::make_image(&config, stream, ts));
                }

                thread::sleep(interval);
            }

            debug!("mock camera stopped");
        });
    }

    fn stop(&self) {
        self.shared.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.shared.listening.load(Ordering::Relaxed)
    }
}

impl CaptureControl for MockCamera {
    fn start_preview(&self, exposure_ns: i64, sensitivity: i32) -> Result<(), SyncError> {
        *self.shared.preview.lock().unwrap() = (exposure_ns, sensitivity);
        debug!(exposure_ns, sensitivity, "mock preview restarted");
        Ok(())
    }

    fn inject_frame(&self, exposure_ns: i64) -> Result<(), SyncError> {
        if !self.is_listening() {
            return Err(SyncError::closed("mock_camera"));
        }
        self.shared
            .pending_injects
            .lock()
            .unwrap()
            .push_back(exposure_ns);
        debug!(exposure_ns, "injection frame queued");
        Ok(())
    }
}
