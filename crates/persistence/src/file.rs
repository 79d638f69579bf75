//! FilePersister - writes captures to disk with folder structure
//!
//! Layout contract: per capture, a directory named by the leader-domain
//! timestamp holding per-stream images with their own metadata files plus
//! a timing sidecar recording both clock domains.

use contracts::{BundleSink, MatchedBundle, SyncError, TriggerTicket};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, error, instrument};

use crate::PersistError;

/// Configuration for FilePersister
#[derive(Debug, Clone)]
pub struct FilePersisterConfig {
    /// Base output directory
    pub base_path: PathBuf,
}

/// Persister that writes captures to disk
pub struct FilePersister {
    name: String,
    config: FilePersisterConfig,
}

impl FilePersister {
    /// Create a new FilePersister
    pub fn new(name: impl Into<String>, config: FilePersisterConfig) -> Result<Self, PersistError> {
        let name = name.into();
        // Create base directory if it doesn't exist
        fs::create_dir_all(&config.base_path)
            .map_err(|e| PersistError::sink_creation(&name, e.to_string()))?;

        Ok(Self { name, config })
    }

    /// Directory for one capture, named by its leader-domain timestamp.
    fn capture_dir(&self, ticket: &TriggerTicket) -> PathBuf {
        self.config
            .base_path
            .join(format!("capture_{:020}", ticket.leader_ts_ns))
    }

    fn write_capture(&self, bundle: &MatchedBundle, ticket: &TriggerTicket) -> std::io::Result<()> {
        let dir = self.capture_dir(ticket);
        fs::create_dir_all(&dir)?;

        // Timing sidecar: both clock domains plus the armed goal.
        {
            let mut sidecar = File::create(dir.join("sync_metadata.txt"))?;
            writeln!(
                sidecar,
                "leader_sensor_timestamp_ns: {}",
                ticket.leader_ts_ns
            )?;
            writeln!(
                sidecar,
                "local_sensor_timestamp_ns: {}",
                bundle.sensor_timestamp_ns()
            )?;
            writeln!(sidecar, "trigger_goal_leader_ns: {}", ticket.goal_leader_ns)?;
            writeln!(sidecar, "lead_underflow: {}", ticket.lead_underflow)?;
            if !bundle.dropped_streams.is_empty() {
                let dropped: Vec<String> = bundle
                    .dropped_streams
                    .iter()
                    .map(usize::to_string)
                    .collect();
                writeln!(sidecar, "dropped_streams: {}", dropped.join(","))?;
            }
        }

        // Per-stream image dump with its own metadata file.
        for (stream, image) in bundle.live_images() {
            let mut raw = File::create(dir.join(format!("img_s{stream}.raw")))?;
            raw.write_all(&image.data)?;

            let mut meta = File::create(dir.join(format!("img_s{stream}_metadata.txt")))?;
            writeln!(meta, "width: {}", image.width)?;
            writeln!(meta, "height: {}", image.height)?;
            writeln!(meta, "buffer_bytes: {}", image.data.len())?;
        }

        Ok(())
    }

    fn persist_capture(
        &self,
        bundle: &MatchedBundle,
        ticket: &TriggerTicket,
    ) -> Result<(), SyncError> {
        self.write_capture(bundle, ticket).map_err(|e| {
            error!(
                persister = %self.name,
                leader_ts_ns = ticket.leader_ts_ns,
                error = %e,
                "write failed"
            );
            SyncError::sink_write(&self.name, e.to_string())
        })
    }
}

impl BundleSink for FilePersister {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_persister_write",
        skip(self, bundle, ticket),
        fields(persister = %self.name, leader_ts_ns = ticket.leader_ts_ns)
    )]
    async fn persist(
        &mut self,
        bundle: &MatchedBundle,
        ticket: &TriggerTicket,
    ) -> Result<(), SyncError> {
        self.persist_capture(bundle, ticket)?;
        Ok(())
    }

    #[instrument(name = "file_persister_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), SyncError> {
        Ok(())
    }

    #[instrument(name = "file_persister_close", skip(self))]
    async fn close(&mut self) -> Result<(), SyncError> {
        debug!(persister = %self.name, "file persister closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{CaptureRequestTag, FrameMetadata, ImageBuffer};
    use tempfile::tempdir;

    fn bundle() -> MatchedBundle {
        MatchedBundle {
            metadata: FrameMetadata {
                tag: CaptureRequestTag::preview(2),
                sensor_timestamp_ns: 4_242,
                sequence_id: 7,
                frame_duration_ns: 33_333_333,
            },
            images: vec![
                Some(ImageBuffer {
                    stream: 0,
                    sensor_timestamp_ns: 4_242,
                    width: 2,
                    height: 2,
                    data: Bytes::from_static(&[1, 2, 3, 4]),
                }),
                None,
            ],
            dropped_streams: vec![1],
        }
    }

    #[tokio::test]
    async fn test_capture_layout() {
        let dir = tempdir().unwrap();
        let mut persister = FilePersister::new(
            "test_file",
            FilePersisterConfig {
                base_path: dir.path().to_path_buf(),
            },
        )
        .unwrap();

        let ticket = TriggerTicket {
            goal_leader_ns: 1_000_000,
            leader_ts_ns: 1_004_242,
            lead_underflow: false,
        };
        persister.persist(&bundle(), &ticket).await.unwrap();

        let capture_dir = dir.path().join(format!("capture_{:020}", 1_004_242));
        assert!(capture_dir.exists());

        let sidecar = fs::read_to_string(capture_dir.join("sync_metadata.txt")).unwrap();
        assert!(sidecar.contains("leader_sensor_timestamp_ns: 1004242"));
        assert!(sidecar.contains("local_sensor_timestamp_ns: 4242"));
        assert!(sidecar.contains("trigger_goal_leader_ns: 1000000"));
        assert!(sidecar.contains("lead_underflow: false"));
        assert!(sidecar.contains("dropped_streams: 1"));

        let raw = fs::read(capture_dir.join("img_s0.raw")).unwrap();
        assert_eq!(raw, vec![1, 2, 3, 4]);
        assert!(!capture_dir.join("img_s1.raw").exists());

        let img_meta = fs::read_to_string(capture_dir.join("img_s0_metadata.txt")).unwrap();
        assert!(img_meta.contains("width: 2"));
        assert!(img_meta.contains("buffer_bytes: 4"));
    }

    #[tokio::test]
    async fn test_underflow_recorded() {
        let dir = tempdir().unwrap();
        let mut persister = FilePersister::new(
            "test_file",
            FilePersisterConfig {
                base_path: dir.path().to_path_buf(),
            },
        )
        .unwrap();

        let ticket = TriggerTicket {
            goal_leader_ns: 500,
            leader_ts_ns: 9_999,
            lead_underflow: true,
        };
        persister.persist(&bundle(), &ticket).await.unwrap();

        let capture_dir = dir.path().join(format!("capture_{:020}", 9_999));
        let sidecar = fs::read_to_string(capture_dir.join("sync_metadata.txt")).unwrap();
        assert!(sidecar.contains("lead_underflow: true"));
    }
}
