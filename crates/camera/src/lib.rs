//! # Camera
//!
//! Camera collaborator implementations.
//!
//! The synchronization core talks to the camera through the `FrameSource`
//! and `CaptureControl` contracts; this crate provides the mock camera
//! used for development and testing without camera hardware. A real HAL
//! bridge implements the same pair of traits.

mod mock;

pub use mock::{MockCamera, MockCameraConfig};

// Re-export contracts types
pub use contracts::{CaptureControl, FrameSource, ImageCallback, MetadataCallback};
