//! Leader-side client registry.
//!
//! Records are insertion-ordered by first-seen and evicted once their
//! heartbeats go stale.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use contracts::{ClientRecord, ClockOffset, MembershipEvent, SyncState};
use metrics::gauge;
use tracing::{debug, info};

/// Observer of membership changes, for UI/logging.
pub type MembershipObserver = Arc<dyn Fn(MembershipEvent) + Send + Sync>;

/// Tracks the clients known to the leader.
#[derive(Default)]
pub struct ClientRegistry {
    records: Mutex<Vec<ClientRecord>>,
    observers: Mutex<Vec<MembershipObserver>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_observer(&self, observer: MembershipObserver) {
        self.observers.lock().unwrap().push(observer);
    }

    fn notify(&self, event: MembershipEvent) {
        let observers = self.observers.lock().unwrap();
        for observer in observers.iter() {
            observer(event.clone());
        }
    }

    /// Upsert a record on heartbeat. Returns the updated record and
    /// whether it is newly joined.
    pub fn observe_heartbeat(
        &self,
        addr: SocketAddr,
        client_id: &str,
        now_ns: i64,
    ) -> (ClientRecord, bool) {
        let (record, is_new) = {
            let mut records = self.records.lock().unwrap();
            match records.iter().position(|r| r.addr == addr) {
                Some(idx) => {
                    let record = &mut records[idx];
                    record.last_heartbeat_ns = now_ns;
                    if record.client_id != client_id {
                        debug!(%addr, client_id, "client id changed");
                        record.client_id = client_id.to_string();
                    }
                    (record.clone(), false)
                }
                None => {
                    let record = ClientRecord {
                        addr,
                        client_id: client_id.to_string(),
                        first_seen_ns: now_ns,
                        last_heartbeat_ns: now_ns,
                        sync_state: SyncState::Unsynced,
                        offset: None,
                    };
                    records.push(record.clone());
                    gauge!("shutter_sync_clients").set(records.len() as f64);
                    (record, true)
                }
            }
        };

        if is_new {
            info!(%addr, client_id, "client joined");
            self.notify(MembershipEvent::Joined(record.clone()));
        }
        (record, is_new)
    }

    /// Update a client's sync state; observers see the change.
    pub fn set_state(&self, addr: SocketAddr, state: SyncState) {
        let changed = {
            let mut records = self.records.lock().unwrap();
            records.iter_mut().find(|r| r.addr == addr).and_then(|r| {
                (r.sync_state != state).then(|| {
                    r.sync_state = state;
                    r.clone()
                })
            })
        };
        if let Some(record) = changed {
            debug!(addr = %record.addr, state = ?record.sync_state, "sync state changed");
            self.notify(MembershipEvent::StateChanged(record));
        }
    }

    /// Record the offset delivered to a client.
    pub fn set_offset(&self, addr: SocketAddr, offset: ClockOffset) {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.iter_mut().find(|r| r.addr == addr) {
            record.offset = Some(offset);
        }
    }

    pub fn get(&self, addr: SocketAddr) -> Option<ClientRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.addr == addr)
            .cloned()
    }

    /// All known clients, insertion-ordered by first-seen.
    pub fn clients(&self) -> Vec<ClientRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Remove records whose last heartbeat is older than `expire_ns`.
    /// Returns the evicted records.
    pub fn evict_stale(&self, now_ns: i64, expire_ns: i64) -> Vec<ClientRecord> {
        let evicted: Vec<ClientRecord> = {
            let mut records = self.records.lock().unwrap();
            let (stale, live): (Vec<_>, Vec<_>) = records
                .drain(..)
                .partition(|r| now_ns - r.last_heartbeat_ns > expire_ns);
            *records = live;
            gauge!("shutter_sync_clients").set(records.len() as f64);
            stale
        };

        for record in &evicted {
            info!(addr = %record.addr, client_id = %record.client_id, "client evicted");
            self.notify(MembershipEvent::Evicted(record.clone()));
        }
        evicted
    }
}
