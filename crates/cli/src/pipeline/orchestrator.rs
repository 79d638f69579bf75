//! Node orchestrator - wires the capture pipeline together.
//!
//! Camera events flow into the synchronizer; matched bundles are drained
//! by the sync worker, converted into the leader time domain, fed to the
//! phase controller, and evaluated by the trigger scheduler. Persisted
//! captures go through a bounded-queue worker that settles buffer
//! accounting on completion.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use camera::{MockCamera, MockCameraConfig};
use clock::{Ticker, TimeDomainConverter};
use contracts::{CaptureControl, FrameSource, NodeBlueprint, SyncCommand};
use frame_sync::{FrameSynchronizer, MatchedBundle, TriggerDecision, TriggerScheduler};
use observability::{record_bundle_matched, record_capture_persisted, record_phase_sample};
use persistence::{FilePersister, FilePersisterConfig, LogPersister, PersistHandle};
use phase_align::PhaseAlignController;
use softsync::{SoftwareSyncClient, SoftwareSyncLeader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::PipelineStats;

/// Which side of the protocol this node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Client,
}

/// Pipeline configuration
pub struct PipelineConfig {
    /// The node blueprint
    pub blueprint: NodeBlueprint,

    /// Leader or client
    pub role: Role,

    /// Stop after this many persisted captures (None = unlimited)
    pub max_captures: Option<u64>,

    /// Node timeout (None = run until interrupted)
    pub timeout: Option<Duration>,

    /// Channel buffer size
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Log captures instead of writing files
    pub log_only: bool,

    /// Leader: broadcast a trigger on this interval
    pub auto_trigger: Option<Duration>,

    /// Leader: broadcast a phase-align request once at startup
    pub phase_align_on_start: bool,
}

enum Controller {
    Leader(Arc<SoftwareSyncLeader>),
    Client(SoftwareSyncClient),
}

/// Main node orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the node to completion
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Commands from the sync controller into this pipeline
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<SyncCommand>(16);

        // Start the sync controller for this role
        let (controller, converter) = match self.config.role {
            Role::Leader => {
                let leader = Arc::new(
                    SoftwareSyncLeader::start(blueprint, cmd_tx.clone())
                        .await
                        .context("Failed to start sync leader")?,
                );
                leader.register_observer(Arc::new(|event| {
                    info!(?event, "membership changed");
                }));
                let converter = leader.converter();
                (Controller::Leader(leader), converter)
            }
            Role::Client => {
                let converter = Arc::new(TimeDomainConverter::new());
                let client =
                    SoftwareSyncClient::start(blueprint, Arc::clone(&converter), cmd_tx.clone())
                        .await
                        .context("Failed to start sync client")?;
                (Controller::Client(client), converter)
            }
        };

        // Camera collaborator (mock frame source)
        let camera = Arc::new(MockCamera::new(MockCameraConfig {
            frame_period_ns: blueprint.phase.frame_period_ns,
            streams: blueprint.streams.len(),
            width: blueprint.camera.width,
            height: blueprint.camera.height,
            initial_skew_ns: blueprint.camera.initial_skew_ns,
            time_scale: 1.0,
            drops: Vec::new(),
        }));

        // Synchronizer with per-stream outstanding bounds
        let sync = Arc::new(FrameSynchronizer::new(
            blueprint.streams.iter().map(|s| s.max_outstanding).collect(),
        ));

        // Matched bundles drain through a bounded channel into the sync worker
        let (bundle_tx, mut bundle_rx) = mpsc::channel::<MatchedBundle>(self.config.buffer_size);
        {
            let weak_sync = Arc::downgrade(&sync);
            sync.register_sink(Arc::new(move |bundle| {
                let rejected = match bundle_tx.try_send(bundle) {
                    Ok(()) => return,
                    Err(mpsc::error::TrySendError::Full(b)) => b,
                    Err(mpsc::error::TrySendError::Closed(b)) => b,
                };
                warn!("sync worker backlog, bundle released");
                if let Some(sync) = weak_sync.upgrade() {
                    sync.release_bundle(rejected);
                }
            }));
        }

        // Camera events into the synchronizer
        {
            let sync_meta = Arc::clone(&sync);
            let sync_image = Arc::clone(&sync);
            camera.listen(
                Arc::new(move |metadata| {
                    if let Err(e) = sync_meta.submit_metadata(metadata) {
                        debug!(error = %e, "metadata rejected");
                    }
                }),
                Arc::new(move |image| {
                    // Back-pressure is rejection: the buffer is simply
                    // dropped here on the producer side.
                    if let Err(e) = sync_image.submit_image(image) {
                        debug!(error = %e, "image rejected");
                    }
                }),
            );
        }

        // Phase alignment and trigger scheduling
        let phase = Arc::new(PhaseAlignController::new(
            blueprint.phase.clone(),
            Arc::clone(&camera) as Arc<dyn CaptureControl>,
        ));
        phase.register_observer(Arc::new(|sample| {
            debug!(
                phase_error_ns = sample.phase_error_ns,
                aligned = sample.aligned,
                "phase status"
            );
        }));
        let trigger = Arc::new(TriggerScheduler::new());

        // Persistence worker behind a bounded queue
        let on_done: persistence::ReleaseCallback = {
            let sync = Arc::clone(&sync);
            Arc::new(move |bundle| sync.release_bundle(bundle))
        };
        let persist = if self.config.log_only {
            PersistHandle::spawn(LogPersister::new("log"), self.config.buffer_size, on_done)
        } else {
            let persister = FilePersister::new(
                "captures",
                FilePersisterConfig {
                    base_path: blueprint.node.output_dir.clone(),
                },
            )
            .context("Failed to create capture output directory")?;
            PersistHandle::spawn(persister, self.config.buffer_size, on_done)
        };

        // Leader-side periodic trigger and startup phase alignment
        let mut leader_tasks = Vec::new();
        if let Controller::Leader(leader) = &controller {
            if let Some(interval) = self.config.auto_trigger {
                let leader = Arc::clone(leader);
                leader_tasks.push(tokio::spawn(async move {
                    loop {
                        tokio::time::sleep(interval).await;
                        if let Err(e) = leader.broadcast_trigger().await {
                            warn!(error = %e, "auto trigger failed");
                        }
                    }
                }));
            }
            if self.config.phase_align_on_start {
                let leader = Arc::clone(leader);
                let delay = Duration::from_millis(blueprint.heartbeat.period_ms * 2);
                leader_tasks.push(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = leader.broadcast_phase_align().await {
                        warn!(error = %e, "startup phase align failed");
                    }
                }));
            }
        }

        info!(role = ?self.config.role, streams = blueprint.streams.len(), "node running");

        // Sync worker loop
        let mut stats = PipelineStats::default();
        let deadline = self.config.timeout.map(|t| tokio::time::Instant::now() + t);
        loop {
            let timeout_sleep = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupt received, shutting down");
                    break;
                }
                _ = timeout_sleep => {
                    info!("node timeout reached");
                    break;
                }
                command = cmd_rx.recv() => match command {
                    Some(command) => {
                        handle_command(command, &converter, &trigger, &phase, camera.as_ref());
                    }
                    None => break,
                },
                bundle = bundle_rx.recv() => match bundle {
                    Some(bundle) => {
                        let fired = process_bundle(
                            bundle, &sync, &converter, &phase, &trigger, &persist, &mut stats,
                        );
                        if fired {
                            if let Some(max) = self.config.max_captures {
                                if stats.captures_persisted >= max {
                                    info!(captures = stats.captures_persisted, "capture limit reached");
                                    break;
                                }
                            }
                        }
                    }
                    None => break,
                },
            }
        }

        // Shutdown
        info!("shutting down node...");
        for task in leader_tasks {
            task.abort();
        }
        camera.stop();
        sync.close();
        // Bundles still sitting in the drain channel hold acquired slots.
        while let Ok(bundle) = bundle_rx.try_recv() {
            sync.release_bundle(bundle);
        }
        persist.shutdown().await;
        match controller {
            Controller::Leader(leader) => leader.close(),
            Controller::Client(client) => client.close(),
        }

        stats.duration = start_time.elapsed();
        info!(
            bundles = stats.bundles_matched,
            captures = stats.captures_persisted,
            duration_secs = stats.duration.as_secs_f64(),
            bundles_per_sec = format!("{:.1}", stats.bundles_per_second()),
            mean_phase_error_ns = stats.phase_error_ns.mean().unwrap_or(0.0),
            "node shutdown complete"
        );

        Ok(stats)
    }
}

/// Apply one controller command to the local pipeline.
fn handle_command(
    command: SyncCommand,
    converter: &TimeDomainConverter,
    trigger: &TriggerScheduler,
    phase: &PhaseAlignController,
    camera: &dyn CaptureControl,
) {
    match command {
        SyncCommand::Trigger { goal_leader_ns } => {
            // Arming needs a leader-domain "now": refuse when unsynced.
            match converter.leader_time_ns(Ticker::global().now_ns()) {
                Ok(now) => {
                    trigger.arm(goal_leader_ns, now);
                }
                Err(e) => warn!(error = %e, "refusing to arm trigger while unsynced"),
            }
        }
        SyncCommand::PhaseAlign => phase.start_align(),
        SyncCommand::Preview2A {
            exposure_ns,
            sensitivity,
        } => {
            if let Err(e) = camera.start_preview(exposure_ns, sensitivity) {
                warn!(error = %e, "preview restart failed");
            }
        }
    }
}

/// Route one matched bundle through phase measurement and the trigger.
/// Returns true when the bundle fired the trigger.
fn process_bundle(
    bundle: MatchedBundle,
    sync: &Arc<FrameSynchronizer>,
    converter: &TimeDomainConverter,
    phase: &PhaseAlignController,
    trigger: &TriggerScheduler,
    persist: &PersistHandle,
    stats: &mut PipelineStats,
) -> bool {
    stats.bundles_matched += 1;
    record_bundle_matched(&bundle);

    // Injection frames exist only to shift sensor phase.
    if bundle.is_injection() {
        stats.injection_frames += 1;
        sync.release_bundle(bundle);
        return false;
    }

    let leader_ts = match converter.leader_time_ns(bundle.sensor_timestamp_ns()) {
        Ok(ts) => ts,
        Err(_) => {
            // No offset installed yet; frames are useless to the rig.
            stats.unsynced_dropped += 1;
            sync.release_bundle(bundle);
            return false;
        }
    };

    let sample = phase.on_frame(leader_ts);
    record_phase_sample(sample.phase_error_ns, sample.aligned);
    stats.phase_error_ns.record(sample.phase_error_ns.abs() as f64);

    match trigger.evaluate(leader_ts, false) {
        TriggerDecision::Persist(ticket) => {
            record_capture_persisted(ticket.leader_ts_ns, ticket.goal_leader_ns);
            if persist.try_submit(bundle, ticket) {
                stats.captures_persisted += 1;
            }
            true
        }
        TriggerDecision::Discard => {
            sync.release_bundle(bundle);
            false
        }
    }
}
