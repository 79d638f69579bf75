//! MatchedBundle - Synchronizer output
//!
//! A metadata record paired with up to N images sharing its sensor timestamp.

use crate::{FrameMetadata, ImageBuffer};

/// Synchronized output of the image-metadata synchronizer.
///
/// For every stream index in `metadata.tag.targets`, either `images[i]`
/// holds a live buffer whose timestamp equals the metadata's exactly, or
/// `i` is listed in `dropped_streams`.
#[derive(Debug)]
pub struct MatchedBundle {
    /// The master metadata record
    pub metadata: FrameMetadata,

    /// Sparse image slots, one per configured stream
    pub images: Vec<Option<ImageBuffer>>,

    /// Streams whose image never arrived (dropped by the producer)
    pub dropped_streams: Vec<usize>,
}

impl MatchedBundle {
    /// Sensor timestamp shared by the metadata and all non-null images.
    pub fn sensor_timestamp_ns(&self) -> i64 {
        self.metadata.sensor_timestamp_ns
    }

    /// Whether this bundle came from a phase-alignment injection frame.
    pub fn is_injection(&self) -> bool {
        self.metadata.tag.is_injection()
    }

    /// Iterate over the live images with their stream indices.
    pub fn live_images(&self) -> impl Iterator<Item = (usize, &ImageBuffer)> {
        self.images
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|img| (i, img)))
    }

    /// Number of live images in the bundle.
    pub fn live_count(&self) -> usize {
        self.images.iter().filter(|slot| slot.is_some()).count()
    }
}
