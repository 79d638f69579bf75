//! NodeBlueprint - Config Loader output
//!
//! Describes the complete node configuration: identity, transport, heartbeat,
//! SNTP burst policy, phase alignment, trigger lead, and image streams.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete node configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NodeBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Node identity and output settings
    #[validate(nested)]
    pub node: NodeConfig,

    /// RPC transport settings
    #[serde(default)]
    #[validate(nested)]
    pub rpc: RpcConfig,

    /// Heartbeat pacing and eviction
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// SNTP burst policy
    #[serde(default)]
    pub sntp: SntpConfig,

    /// Phase alignment control parameters
    #[serde(default)]
    pub phase: PhaseConfig,

    /// Trigger scheduling
    #[serde(default)]
    pub trigger: TriggerConfig,

    /// Image stream definitions (index order = stream index)
    pub streams: Vec<StreamConfig>,

    /// Camera simulation parameters (mock frame source)
    #[serde(default)]
    pub camera: CameraConfig,
}

/// Node identity configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NodeConfig {
    /// Self-reported identifier, sent in heartbeats
    #[validate(length(min = 1, message = "client id cannot be empty"))]
    pub client_id: String,

    /// Base directory for persisted captures
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Prometheus metrics port (0 = disabled)
    #[serde(default)]
    pub metrics_port: u16,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./captures")
}

/// RPC transport configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RpcConfig {
    /// UDP port the leader binds and clients send to
    #[serde(default = "default_rpc_port")]
    #[validate(range(min = 49152, message = "rpc port must be in the dynamic range"))]
    pub port: u16,

    /// Override for the discovery broadcast address.
    ///
    /// When unset, the address is derived from the local interface and
    /// `prefix_len`.
    #[serde(default)]
    pub broadcast_addr: Option<Ipv4Addr>,

    /// Network prefix length used to derive the broadcast address
    #[serde(default = "default_prefix_len")]
    #[validate(range(min = 1, max = 31))]
    pub prefix_len: u8,
}

fn default_rpc_port() -> u16 {
    51_200
}

fn default_prefix_len() -> u8 {
    24
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            port: default_rpc_port(),
            broadcast_addr: None,
            prefix_len: default_prefix_len(),
        }
    }
}

/// Heartbeat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Heartbeat period in milliseconds
    pub period_ms: u64,

    /// Records older than `period_ms * expire_periods` are evicted
    pub expire_periods: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            period_ms: 1_000,
            expire_periods: 5,
        }
    }
}

impl HeartbeatConfig {
    /// Eviction horizon in nanoseconds.
    pub fn expire_ns(&self) -> i64 {
        (self.period_ms * self.expire_periods as u64 * 1_000_000) as i64
    }
}

/// SNTP burst configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SntpConfig {
    /// Exchanges per burst
    pub burst_size: usize,

    /// Inter-sample spacing in milliseconds
    pub spacing_ms: u64,

    /// Per-sample deadline in milliseconds; exceeding it abandons the burst
    pub sample_deadline_ms: u64,

    /// Burst retries before marking the client unsynced
    pub max_retries: u32,
}

impl Default for SntpConfig {
    fn default() -> Self {
        Self {
            burst_size: 20,
            spacing_ms: 10,
            sample_deadline_ms: 200,
            max_retries: 3,
        }
    }
}

/// Phase alignment configuration
///
/// Read-only after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Sensor frame period in nanoseconds
    pub frame_period_ns: i64,

    /// Target phase within the period, in `[0, frame_period_ns)`
    pub goal_phase_ns: i64,

    /// Frames skipped after each injection before re-measuring
    pub settle_frames: u32,

    /// Convergence threshold in nanoseconds
    pub tolerance_ns: i64,

    /// Lower clamp for the injection frame exposure
    pub min_inject_exposure_ns: i64,

    /// Upper clamp for the injection frame exposure
    pub max_inject_exposure_ns: i64,

    /// Proportional damping factor in `(0, 1]`
    pub step_gain: f64,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        // 30 fps sensor
        Self {
            frame_period_ns: 33_333_333,
            goal_phase_ns: 0,
            settle_frames: 4,
            tolerance_ns: 100_000,
            min_inject_exposure_ns: 1_000_000,
            max_inject_exposure_ns: 65_000_000,
            step_gain: 0.5,
        }
    }
}

/// Trigger scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Safety lead added to `now` when the leader broadcasts a trigger,
    /// in milliseconds
    pub future_lead_ms: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            future_lead_ms: 500,
        }
    }
}

impl TriggerConfig {
    /// Safety lead in nanoseconds.
    pub fn future_lead_ns(&self) -> i64 {
        (self.future_lead_ms * 1_000_000) as i64
    }
}

/// One image stream definition
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StreamConfig {
    /// Maximum buffers acquired but not yet released on this stream
    #[serde(default = "default_max_outstanding")]
    #[validate(range(min = 1))]
    pub max_outstanding: usize,
}

fn default_max_outstanding() -> usize {
    4
}

/// Mock camera parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Image width
    pub width: u32,

    /// Image height
    pub height: u32,

    /// Initial sensor phase skew in nanoseconds
    pub initial_skew_ns: i64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            initial_skew_ns: 0,
        }
    }
}
