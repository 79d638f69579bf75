//! Image-metadata pairing by exact sensor timestamp.
//!
//! The synchronizer owns one metadata queue and N image queues. Metadata is
//! the master: the camera emits a metadata record for every sensor frame,
//! whereas an image stream may be dropped under memory pressure, so the
//! timestamp inequality at the queue heads is the sole diagnostic for the
//! drop direction.
//!
//! The invariant maintained per sweep: at least one of the metadata queue
//! and the targeted image queues is empty when the sweep returns.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use contracts::{FrameMetadata, ImageBuffer, MatchedBundle, SyncError};
use metrics::counter;
use tracing::{debug, trace, warn};

/// Delivery target for matched bundles. The callback takes ownership; the
/// consumer settles buffer accounting through [`FrameSynchronizer::release`].
pub type BundleCallback = Arc<dyn Fn(MatchedBundle) + Send + Sync>;

/// Drop accounting snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounters {
    /// Bundles delivered to the sink
    pub matched: u64,
    /// Images released because their metadata never arrived
    pub orphaned_images: u64,
    /// Bundle slots left null because the image never arrived
    pub dropped_images: u64,
}

struct Queues {
    meta: VecDeque<FrameMetadata>,
    images: Vec<VecDeque<ImageBuffer>>,
}

/// Pairs metadata records with image buffers sharing their sensor
/// timestamp, over N independently bounded streams.
pub struct FrameSynchronizer {
    queues: Mutex<Queues>,
    sink: Mutex<Option<BundleCallback>>,
    /// Buffers accepted but not yet released, per stream. Kept outside the
    /// queue mutex so `release` never contends with a sweep.
    acquired: Vec<AtomicUsize>,
    max_outstanding: Vec<usize>,
    closed: AtomicBool,
    matched: AtomicU64,
    orphaned_images: AtomicU64,
    dropped_images: AtomicU64,
}

impl FrameSynchronizer {
    /// Create a synchronizer with one queue per stream; `max_outstanding`
    /// bounds the buffers acquired but not yet released on each stream.
    pub fn new(max_outstanding: Vec<usize>) -> Self {
        let n = max_outstanding.len();
        Self {
            queues: Mutex::new(Queues {
                meta: VecDeque::new(),
                images: (0..n).map(|_| VecDeque::new()).collect(),
            }),
            sink: Mutex::new(None),
            acquired: (0..n).map(|_| AtomicUsize::new(0)).collect(),
            max_outstanding,
            closed: AtomicBool::new(false),
            matched: AtomicU64::new(0),
            orphaned_images: AtomicU64::new(0),
            dropped_images: AtomicU64::new(0),
        }
    }

    /// Number of configured streams.
    pub fn stream_count(&self) -> usize {
        self.max_outstanding.len()
    }

    /// Register the delivery target for matched bundles.
    pub fn register_sink(&self, sink: BundleCallback) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    /// Submit one metadata record and sweep.
    ///
    /// Records with an empty target set never enter the queues
    /// (viewfinder-only requests); they are logged and discarded.
    pub fn submit_metadata(&self, metadata: FrameMetadata) -> Result<(), SyncError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SyncError::closed("frame_synchronizer"));
        }
        if metadata.tag.targets.is_empty() {
            trace!(
                sequence_id = metadata.sequence_id,
                "metadata without targets discarded"
            );
            return Err(SyncError::MissingTargets);
        }
        if let Some(&bad) = metadata
            .tag
            .targets
            .iter()
            .find(|&&i| i >= self.stream_count())
        {
            warn!(
                stream = bad,
                streams = self.stream_count(),
                "metadata targets unknown stream, record discarded"
            );
            return Err(SyncError::malformed(
                0,
                format!("target stream {bad} out of range"),
            ));
        }

        let emitted = {
            let mut queues = self.queues.lock().unwrap();
            queues.meta.push_back(metadata);
            self.sweep(&mut queues)
        };
        self.deliver(emitted);
        Ok(())
    }

    /// Submit one image buffer and sweep.
    ///
    /// # Errors
    /// `Backpressure` when the stream is at its outstanding limit; the
    /// caller still owns the buffer and must drop it.
    pub fn submit_image(&self, image: ImageBuffer) -> Result<(), SyncError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SyncError::closed("frame_synchronizer"));
        }
        let stream = image.stream;
        if stream >= self.stream_count() {
            return Err(SyncError::malformed(
                0,
                format!("image stream {stream} out of range"),
            ));
        }

        let max = self.max_outstanding[stream];
        // Back-pressure is rejection, not blocking: refuse the slot and
        // leave the buffer with the producer.
        let reserved = self.acquired[stream]
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            });
        if let Err(outstanding) = reserved {
            counter!("shutter_sync_backpressure_total").increment(1);
            return Err(SyncError::Backpressure {
                stream,
                outstanding,
                max,
            });
        }

        let emitted = {
            let mut queues = self.queues.lock().unwrap();
            queues.images[stream].push_back(image);
            self.sweep(&mut queues)
        };
        self.deliver(emitted);
        Ok(())
    }

    /// The consumer signals it has released one buffer from `stream`.
    ///
    /// # Panics
    /// Underflow is a programming error and aborts the calling worker.
    pub fn release(&self, stream: usize) {
        let result = self.acquired[stream].fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
            n.checked_sub(1)
        });
        if result.is_err() {
            panic!("release underflow on stream {stream}");
        }
    }

    /// Release every live image of a bundle and drop it.
    pub fn release_bundle(&self, bundle: MatchedBundle) {
        for (stream, _) in bundle.live_images() {
            self.release(stream);
        }
    }

    /// Buffers currently acquired on `stream`.
    pub fn acquired_count(&self, stream: usize) -> usize {
        self.acquired[stream].load(Ordering::Acquire)
    }

    /// Total buffers acquired across all streams.
    pub fn total_acquired(&self) -> usize {
        self.acquired
            .iter()
            .map(|a| a.load(Ordering::Acquire))
            .sum()
    }

    /// Drop accounting snapshot.
    pub fn counters(&self) -> SyncCounters {
        SyncCounters {
            matched: self.matched.load(Ordering::Relaxed),
            orphaned_images: self.orphaned_images.load(Ordering::Relaxed),
            dropped_images: self.dropped_images.load(Ordering::Relaxed),
        }
    }

    /// Drop all queued buffers and refuse further submissions.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            warn!("frame synchronizer already closed");
            return;
        }
        let mut queues = self.queues.lock().unwrap();
        for (stream, queue) in queues.images.iter_mut().enumerate() {
            while queue.pop_front().is_some() {
                self.release(stream);
            }
        }
        queues.meta.clear();
        debug!("frame synchronizer closed");
    }

    /// Sweep the queues while the metadata head can make progress.
    ///
    /// Returns the bundles to deliver; delivery happens outside the lock.
    fn sweep(&self, queues: &mut Queues) -> Vec<MatchedBundle> {
        let mut emitted = Vec::new();

        'outer: while let Some(head) = queues.meta.front() {
            let targets = head.tag.targets.clone();
            let ts_m = head.sensor_timestamp_ns;

            loop {
                // Await arrivals: every targeted queue must have a head.
                if targets.iter().any(|&i| queues.images[i].is_empty()) {
                    break 'outer;
                }

                // Older images than the master metadata mean their own
                // metadata was dropped: release them and re-examine.
                let mut orphan_pass = false;
                for &i in &targets {
                    let stale = queues.images[i]
                        .front()
                        .is_some_and(|img| ts_m > img.sensor_timestamp_ns);
                    if stale {
                        let img = queues.images[i].pop_front().unwrap();
                        trace!(
                            stream = i,
                            image_ts = img.sensor_timestamp_ns,
                            meta_ts = ts_m,
                            "orphaned image released"
                        );
                        drop(img);
                        self.release(i);
                        self.orphaned_images.fetch_add(1, Ordering::Relaxed);
                        counter!("shutter_sync_images_orphaned_total").increment(1);
                        orphan_pass = true;
                    }
                }
                if orphan_pass {
                    continue;
                }

                // All heads now have `img.ts >= ts_m`: classify into
                // matches and dropped slots.
                let mut images: Vec<Option<ImageBuffer>> =
                    (0..self.stream_count()).map(|_| None).collect();
                let mut dropped_streams = Vec::new();
                for &i in &targets {
                    let newer = queues.images[i]
                        .front()
                        .is_some_and(|img| ts_m < img.sensor_timestamp_ns);
                    if newer {
                        // The matching image never arrived; the queued one
                        // belongs to a future metadata record.
                        dropped_streams.push(i);
                        self.dropped_images.fetch_add(1, Ordering::Relaxed);
                        counter!("shutter_sync_images_dropped_total").increment(1);
                    } else {
                        images[i] = queues.images[i].pop_front();
                    }
                }

                let metadata = queues.meta.pop_front().unwrap();
                self.matched.fetch_add(1, Ordering::Relaxed);
                counter!("shutter_sync_bundles_matched_total").increment(1);
                emitted.push(MatchedBundle {
                    metadata,
                    images,
                    dropped_streams,
                });
                continue 'outer;
            }
        }

        emitted
    }

    /// Deliver bundles to the registered sink, or release them when no
    /// sink is registered.
    fn deliver(&self, bundles: Vec<MatchedBundle>) {
        if bundles.is_empty() {
            return;
        }
        let sink = self.sink.lock().unwrap().clone();
        for bundle in bundles {
            match &sink {
                Some(callback) => callback(bundle),
                None => self.release_bundle(bundle),
            }
        }
    }
}
