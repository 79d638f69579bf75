//! Text payload codecs for the reserved methods.
//!
//! Payloads are UTF-8 comma-separated fields; field order is normative.

use contracts::{ClockOffset, SyncError};

use crate::method;

fn split_fields(method_id: i32, payload: &str, n: usize) -> Result<Vec<&str>, SyncError> {
    let fields: Vec<&str> = payload.split(',').collect();
    if fields.len() != n {
        return Err(SyncError::malformed(
            method_id,
            format!("expected {} fields, got {}", n, fields.len()),
        ));
    }
    Ok(fields)
}

fn parse_field<T: std::str::FromStr>(
    method_id: i32,
    field: &str,
    name: &str,
) -> Result<T, SyncError> {
    field
        .trim()
        .parse()
        .map_err(|_| SyncError::malformed(method_id, format!("bad {name}: '{field}'")))
}

/// `HEARTBEAT` payload: `client_id,synced`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    pub client_id: String,
    pub synced: bool,
}

impl Heartbeat {
    pub fn encode(&self) -> String {
        format!("{},{}", self.client_id, self.synced)
    }

    pub fn parse(payload: &str) -> Result<Self, SyncError> {
        let fields = split_fields(method::HEARTBEAT, payload, 2)?;
        if fields[0].is_empty() {
            return Err(SyncError::malformed(method::HEARTBEAT, "empty client id"));
        }
        Ok(Self {
            client_id: fields[0].to_string(),
            synced: parse_field(method::HEARTBEAT, fields[1], "synced")?,
        })
    }
}

/// `SNTP_REQ` payload: `t0`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SntpReq {
    pub t0: i64,
}

impl SntpReq {
    pub fn encode(&self) -> String {
        self.t0.to_string()
    }

    pub fn parse(payload: &str) -> Result<Self, SyncError> {
        Ok(Self {
            t0: parse_field(method::SNTP_REQ, payload, "t0")?,
        })
    }
}

/// `SNTP_RESP` payload: `t0,t1,t2`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SntpResp {
    pub t0: i64,
    pub t1: i64,
    pub t2: i64,
}

impl SntpResp {
    pub fn encode(&self) -> String {
        format!("{},{},{}", self.t0, self.t1, self.t2)
    }

    pub fn parse(payload: &str) -> Result<Self, SyncError> {
        let fields = split_fields(method::SNTP_RESP, payload, 3)?;
        Ok(Self {
            t0: parse_field(method::SNTP_RESP, fields[0], "t0")?,
            t1: parse_field(method::SNTP_RESP, fields[1], "t1")?,
            t2: parse_field(method::SNTP_RESP, fields[2], "t2")?,
        })
    }
}

/// `OFFSET_UPDATE` payload: `offset_ns,error_bound_ns`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetUpdate {
    pub offset: ClockOffset,
}

impl OffsetUpdate {
    pub fn encode(&self) -> String {
        format!("{},{}", self.offset.offset_ns, self.offset.error_bound_ns)
    }

    pub fn parse(payload: &str) -> Result<Self, SyncError> {
        let fields = split_fields(method::OFFSET_UPDATE, payload, 2)?;
        Ok(Self {
            offset: ClockOffset::new(
                parse_field(method::OFFSET_UPDATE, fields[0], "offset_ns")?,
                parse_field(method::OFFSET_UPDATE, fields[1], "error_bound_ns")?,
            ),
        })
    }
}

/// `SET_TRIGGER_TIME` payload: `t_trigger_leader_ns`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerTime {
    pub goal_leader_ns: i64,
}

impl TriggerTime {
    pub fn encode(&self) -> String {
        self.goal_leader_ns.to_string()
    }

    pub fn parse(payload: &str) -> Result<Self, SyncError> {
        Ok(Self {
            goal_leader_ns: parse_field(method::SET_TRIGGER_TIME, payload, "trigger time")?,
        })
    }
}

/// `SET_2A` payload: `exposure_ns,sensitivity`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwoA {
    pub exposure_ns: i64,
    pub sensitivity: i32,
}

impl TwoA {
    pub fn encode(&self) -> String {
        format!("{},{}", self.exposure_ns, self.sensitivity)
    }

    pub fn parse(payload: &str) -> Result<Self, SyncError> {
        let fields = split_fields(method::SET_2A, payload, 2)?;
        Ok(Self {
            exposure_ns: parse_field(method::SET_2A, fields[0], "exposure_ns")?,
            sensitivity: parse_field(method::SET_2A, fields[1], "sensitivity")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_round_trip() {
        let hb = Heartbeat {
            client_id: "pixel-3".to_string(),
            synced: true,
        };
        assert_eq!(hb.encode(), "pixel-3,true");
        assert_eq!(Heartbeat::parse(&hb.encode()).unwrap(), hb);
    }

    #[test]
    fn test_heartbeat_rejects_empty_id() {
        assert!(Heartbeat::parse(",false").is_err());
    }

    #[test]
    fn test_sntp_resp_round_trip() {
        let resp = SntpResp {
            t0: 100,
            t1: 1_000_100,
            t2: 1_000_200,
        };
        assert_eq!(resp.encode(), "100,1000100,1000200");
        assert_eq!(SntpResp::parse(&resp.encode()).unwrap(), resp);
    }

    #[test]
    fn test_offset_update_negative_offset() {
        let update = OffsetUpdate {
            offset: ClockOffset::new(-999_950, 50),
        };
        let parsed = OffsetUpdate::parse(&update.encode()).unwrap();
        assert_eq!(parsed.offset.offset_ns, -999_950);
        assert_eq!(parsed.offset.error_bound_ns, 50);
    }

    #[test]
    fn test_malformed_field_count() {
        assert!(SntpResp::parse("1,2").is_err());
        assert!(TwoA::parse("123").is_err());
    }

    #[test]
    fn test_malformed_number() {
        assert!(TriggerTime::parse("not-a-number").is_err());
    }

    #[test]
    fn test_whitespace_tolerated() {
        let resp = SntpResp::parse(" 1, 2 ,3 ").unwrap();
        assert_eq!(resp, SntpResp { t0: 1, t1: 2, t2: 3 });
    }
}
