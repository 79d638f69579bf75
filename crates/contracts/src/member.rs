//! Leader-side membership records.

use std::net::SocketAddr;

use crate::ClockOffset;

/// Synchronization state of one client, as tracked by the leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No offset negotiated and the client does not claim one
    Unsynced,
    /// An SNTP exchange is in flight, or the client claims an offset
    /// the leader has not negotiated
    Syncing,
    /// The leader sent an offset and the client acknowledged it via
    /// heartbeat
    Synced,
}

/// One known client on the leader.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    /// Address heartbeats arrive from (also the unicast reply target)
    pub addr: SocketAddr,

    /// Self-reported client identifier
    pub client_id: String,

    /// Local ticker time when the client was first seen
    pub first_seen_ns: i64,

    /// Local ticker time of the last heartbeat
    pub last_heartbeat_ns: i64,

    /// Current synchronization state
    pub sync_state: SyncState,

    /// Offset the leader last delivered to this client
    pub offset: Option<ClockOffset>,
}

/// Membership change notifications for UI/logging observers.
#[derive(Debug, Clone)]
pub enum MembershipEvent {
    /// A client was seen for the first time
    Joined(ClientRecord),
    /// A client's sync state changed
    StateChanged(ClientRecord),
    /// A client's heartbeats went stale and the record was evicted
    Evicted(ClientRecord),
}
