//! FrameSource trait - Camera event source abstraction
//!
//! Defines a unified interface for camera frame producers, decoupling the
//! synchronization pipeline from the concrete camera implementation.
//! Supports unified handling of a real camera HAL bridge and mock cameras.

use std::sync::Arc;

use crate::{FrameMetadata, ImageBuffer};

/// Metadata delivery callback.
///
/// Called once per sensor frame, in frame order.
pub type MetadataCallback = Arc<dyn Fn(FrameMetadata) + Send + Sync>;

/// Image delivery callback.
///
/// Called once per surviving image buffer; buffers for a frame may be
/// skipped entirely when the producer drops them under memory pressure.
pub type ImageCallback = Arc<dyn Fn(ImageBuffer) + Send + Sync>;

/// Camera frame source trait.
///
/// The producer calls the metadata callback for every frame and the image
/// callback for every buffer it manages to hand over. Callbacks run on the
/// producer's own context; implementations must not assume a runtime.
pub trait FrameSource: Send + Sync {
    /// Register delivery callbacks and start producing.
    ///
    /// If already listening, repeated calls are idempotent (no second
    /// producer is started).
    fn listen(&self, on_metadata: MetadataCallback, on_image: ImageCallback);

    /// Stop producing frames.
    fn stop(&self);

    /// Check if currently producing.
    fn is_listening(&self) -> bool;
}
