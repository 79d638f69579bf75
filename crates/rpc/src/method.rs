//! Reserved RPC method IDs.
//!
//! The protocol range (100xxx) carries membership and clock negotiation;
//! the command range (200xxx) carries leader broadcasts.

/// Client → leader: `client_id,synced`
pub const HEARTBEAT: i32 = 100_001;

/// Leader → client: empty; latches the leader's address on the client
pub const HEARTBEAT_ACK: i32 = 100_002;

/// Leader → client: `t0`
pub const SNTP_REQ: i32 = 100_003;

/// Client → leader: `t0,t1,t2`
pub const SNTP_RESP: i32 = 100_004;

/// Leader → client: `offset_ns,error_bound_ns`
pub const OFFSET_UPDATE: i32 = 100_005;

/// Leader → clients (broadcast): `t_trigger_leader_ns`
pub const SET_TRIGGER_TIME: i32 = 200_001;

/// Leader → clients (broadcast): `exposure_ns,sensitivity`
pub const SET_2A: i32 = 200_002;

/// Leader → clients (broadcast): empty
pub const DO_PHASE_ALIGN: i32 = 200_003;

/// Human-readable method name for logging.
pub fn name(method_id: i32) -> &'static str {
    match method_id {
        HEARTBEAT => "heartbeat",
        HEARTBEAT_ACK => "heartbeat_ack",
        SNTP_REQ => "sntp_req",
        SNTP_RESP => "sntp_resp",
        OFFSET_UPDATE => "offset_update",
        SET_TRIGGER_TIME => "set_trigger_time",
        SET_2A => "set_2a",
        DO_PHASE_ALIGN => "do_phase_align",
        _ => "unknown",
    }
}
