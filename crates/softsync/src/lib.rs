//! # SoftSync
//!
//! Leader/client synchronization controllers.
//!
//! The leader tracks live clients through heartbeats, negotiates a clock
//! offset for each via SNTP bursts, and broadcasts capture commands. The
//! client advertises itself, installs negotiated offsets, and relays
//! broadcast commands into its local capture pipeline.

mod client;
mod leader;
mod registry;

pub use client::SoftwareSyncClient;
pub use leader::SoftwareSyncLeader;
pub use registry::{ClientRegistry, MembershipObserver};

// Re-export contracts types
pub use contracts::{ClientRecord, MembershipEvent, SyncCommand, SyncState};
