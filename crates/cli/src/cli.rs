//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Shutter Syncer - synchronized multi-device capture over WiFi
#[derive(Parser, Debug)]
#[command(
    name = "shutter-syncer",
    author,
    version,
    about = "Synchronized multi-device capture node",
    long_about = "Runs one node of a synchronized capture rig.\n\n\
                  The leader discovers clients over UDP broadcast, negotiates a \n\
                  clock offset for each, aligns sensor phases, and broadcasts \n\
                  capture triggers that all devices match on a common time base."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SHUTTER_SYNCER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SHUTTER_SYNCER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the node as the capture leader
    Leader(RunArgs),

    /// Run the node as a capture client
    Client(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `leader` and `client` commands
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "node.toml", env = "SHUTTER_SYNCER_CONFIG")]
    pub config: PathBuf,

    /// Override the RPC port from configuration
    #[arg(long, env = "SHUTTER_SYNCER_PORT")]
    pub port: Option<u16>,

    /// Override the client id from configuration
    #[arg(long, env = "SHUTTER_SYNCER_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Send discovery datagrams to this address instead of the derived
    /// interface broadcast (clients only)
    #[arg(long, env = "SHUTTER_SYNCER_LEADER_ADDR")]
    pub leader_addr: Option<Ipv4Addr>,

    /// Stop after this many persisted captures (0 = unlimited)
    #[arg(long, default_value = "0", env = "SHUTTER_SYNCER_MAX_CAPTURES")]
    pub max_captures: u64,

    /// Node timeout in seconds (0 = run until interrupted)
    #[arg(long, default_value = "0", env = "SHUTTER_SYNCER_TIMEOUT")]
    pub timeout: u64,

    /// Channel buffer size for internal queues
    #[arg(long, default_value = "64", env = "SHUTTER_SYNCER_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = use configuration value)
    #[arg(long, default_value = "0", env = "SHUTTER_SYNCER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Override the capture output directory
    #[arg(long, env = "SHUTTER_SYNCER_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Log captures instead of writing them to disk
    #[arg(long)]
    pub log_only: bool,

    /// Leader: broadcast a capture trigger every N milliseconds (0 = off)
    #[arg(long, default_value = "0", env = "SHUTTER_SYNCER_AUTO_TRIGGER_MS")]
    pub auto_trigger_ms: u64,

    /// Leader: broadcast a phase-align request once at startup
    #[arg(long)]
    pub phase_align: bool,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "node.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "node.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum LogFormat {
    /// Structured JSON logs
    Json,
    /// Human-readable multi-line format
    Pretty,
    /// Compact single-line format
    Compact,
}
