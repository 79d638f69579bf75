//! CaptureControl trait - capture request seam toward the camera.

use crate::SyncError;

/// Capture request interface exposed by the camera collaborator.
///
/// Mirrors the two request shapes the pipeline needs: the repeating
/// manual-exposure preview, and the single anomalous-exposure injection
/// frame used to shift sensor phase.
pub trait CaptureControl: Send + Sync {
    /// Re-issue the repeating preview with manual exposure/sensitivity.
    fn start_preview(&self, exposure_ns: i64, sensitivity: i32) -> Result<(), SyncError>;

    /// Request one injection frame of the given exposure.
    ///
    /// The request is tagged as an injection frame so downstream consumers
    /// discard the resulting bundle.
    fn inject_frame(&self, exposure_ns: i64) -> Result<(), SyncError>;
}
