//! The leader controller.
//!
//! Owns the leader transport and the client registry, negotiates clock
//! offsets through SNTP bursts, and broadcasts capture commands. Every
//! broadcast is echoed into the leader's own capture pipeline so the
//! leader captures alongside its clients.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clock::{SntpBurst, SntpSample, Ticker, TimeDomainConverter};
use contracts::{
    ClientRecord, ClockOffset, NodeBlueprint, SntpConfig, SyncCommand, SyncError, SyncState,
};
use metrics::histogram;
use rpc::{method, Heartbeat, LeaderTransport, OffsetUpdate, SntpReq, SntpResp, TriggerTime, TwoA};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

use crate::registry::{ClientRegistry, MembershipObserver};

/// State shared between handlers, burst tasks, and the eviction loop.
struct LeaderShared {
    transport: Arc<LeaderTransport>,
    registry: ClientRegistry,
    sntp: SntpConfig,
    /// Clients with an SNTP burst currently in flight
    in_flight: Mutex<HashSet<SocketAddr>>,
    /// Routes SNTP responses to their burst task by sender address
    pending_sntp: Mutex<HashMap<SocketAddr, mpsc::Sender<SntpResp>>>,
}

/// The leader-side synchronization controller.
pub struct SoftwareSyncLeader {
    shared: Arc<LeaderShared>,
    converter: Arc<TimeDomainConverter>,
    trigger_lead_ns: i64,
    commands: mpsc::Sender<SyncCommand>,
    evict_task: JoinHandle<()>,
}

impl SoftwareSyncLeader {
    /// Bind the leader transport, register the protocol handlers, and
    /// start the eviction loop.
    #[instrument(name = "leader_start", skip(blueprint, commands))]
    pub async fn start(
        blueprint: &NodeBlueprint,
        commands: mpsc::Sender<SyncCommand>,
    ) -> Result<Self, SyncError> {
        let transport = Arc::new(LeaderTransport::bind(blueprint.rpc.port).await?);
        let shared = Arc::new(LeaderShared {
            transport: Arc::clone(&transport),
            registry: ClientRegistry::new(),
            sntp: blueprint.sntp.clone(),
            in_flight: Mutex::new(HashSet::new()),
            pending_sntp: Mutex::new(HashMap::new()),
        });

        register_handlers(&shared);

        let evict_task = {
            let shared = Arc::clone(&shared);
            let period = Duration::from_millis(blueprint.heartbeat.period_ms);
            let expire_ns = blueprint.heartbeat.expire_ns();
            tokio::spawn(async move {
                loop {
                    sleep(period).await;
                    let now = Ticker::global().now_ns();
                    for record in shared.registry.evict_stale(now, expire_ns) {
                        shared.transport.remove_peer(record.addr);
                    }
                }
            })
        };

        info!(port = blueprint.rpc.port, "software sync leader started");

        Ok(Self {
            shared,
            converter: Arc::new(TimeDomainConverter::leader()),
            trigger_lead_ns: blueprint.trigger.future_lead_ns(),
            commands,
            evict_task,
        })
    }

    /// The leader's time domain converter (the identity mapping).
    pub fn converter(&self) -> Arc<TimeDomainConverter> {
        Arc::clone(&self.converter)
    }

    /// Current leader-domain time.
    pub fn leader_time_ns(&self) -> i64 {
        Ticker::global().now_ns()
    }

    /// Known clients, insertion-ordered by first-seen.
    pub fn clients(&self) -> Vec<ClientRecord> {
        self.shared.registry.clients()
    }

    pub fn register_observer(&self, observer: MembershipObserver) {
        self.shared.registry.register_observer(observer);
    }

    /// The bound RPC address (useful when binding port 0 in tests).
    pub fn local_addr(&self) -> Result<SocketAddr, SyncError> {
        self.shared.transport.local_addr()
    }

    /// Broadcast a capture trigger `future_lead` in the future and arm
    /// the local pipeline for the same goal. Returns the goal timestamp.
    pub async fn broadcast_trigger(&self) -> Result<i64, SyncError> {
        let now = self.leader_time_ns();
        let goal = now + self.trigger_lead_ns;
        let payload = TriggerTime {
            goal_leader_ns: goal,
        }
        .encode();

        let sent = self
            .shared
            .transport
            .broadcast(method::SET_TRIGGER_TIME, &payload)
            .await?;
        info!(goal_leader_ns = goal, clients = sent, "trigger broadcast");

        self.echo_local(SyncCommand::Trigger {
            goal_leader_ns: goal,
        });
        Ok(goal)
    }

    /// Broadcast manual 2A values and apply them locally.
    pub async fn broadcast_2a(&self, exposure_ns: i64, sensitivity: i32) -> Result<(), SyncError> {
        let payload = TwoA {
            exposure_ns,
            sensitivity,
        }
        .encode();
        self.shared.transport.broadcast(method::SET_2A, &payload).await?;
        info!(exposure_ns, sensitivity, "2a broadcast");

        self.echo_local(SyncCommand::Preview2A {
            exposure_ns,
            sensitivity,
        });
        Ok(())
    }

    /// Broadcast a phase-alignment request and start a local cycle.
    pub async fn broadcast_phase_align(&self) -> Result<(), SyncError> {
        self.shared
            .transport
            .broadcast(method::DO_PHASE_ALIGN, "")
            .await?;
        info!("phase align broadcast");

        self.echo_local(SyncCommand::PhaseAlign);
        Ok(())
    }

    fn echo_local(&self, command: SyncCommand) {
        if self.commands.try_send(command).is_err() {
            warn!(?command, "local command queue full, command dropped");
        }
    }

    /// Stop the eviction loop and the transport.
    pub fn close(&self) {
        self.evict_task.abort();
        self.shared.transport.close();
        debug!("software sync leader closed");
    }
}

impl Drop for SoftwareSyncLeader {
    fn drop(&mut self) {
        self.close();
    }
}

fn register_handlers(shared: &Arc<LeaderShared>) {
    // HEARTBEAT: upsert membership, ack, and drive the sync state machine.
    {
        let shared = Arc::clone(shared);
        let transport = Arc::clone(&shared.transport);
        transport.register_handler(
            method::HEARTBEAT,
            Arc::new(move |addr, payload| {
                let hb = match Heartbeat::parse(&payload) {
                    Ok(hb) => hb,
                    Err(e) => {
                        warn!(%addr, error = %e, "bad heartbeat discarded");
                        return;
                    }
                };
                handle_heartbeat(&shared, addr, hb);
            }),
        );
    }

    // SNTP_RESP: route to the burst task driving this client.
    {
        let shared = Arc::clone(shared);
        let transport = Arc::clone(&shared.transport);
        transport.register_handler(
            method::SNTP_RESP,
            Arc::new(move |addr, payload| {
                let resp = match SntpResp::parse(&payload) {
                    Ok(resp) => resp,
                    Err(e) => {
                        warn!(%addr, error = %e, "bad sntp response discarded");
                        return;
                    }
                };
                let pending = shared.pending_sntp.lock().unwrap();
                match pending.get(&addr) {
                    Some(tx) => {
                        if tx.try_send(resp).is_err() {
                            debug!(%addr, "sntp response queue full, sample lost");
                        }
                    }
                    None => debug!(%addr, "unsolicited sntp response discarded"),
                }
            }),
        );
    }
}

fn handle_heartbeat(shared: &Arc<LeaderShared>, addr: SocketAddr, hb: Heartbeat) {
    let now = Ticker::global().now_ns();
    let (record, is_new) = shared.registry.observe_heartbeat(addr, &hb.client_id, now);
    if is_new {
        shared.transport.add_peer(addr);
    }

    // Ack from a worker task; the dispatch loop never blocks on sends.
    {
        let transport = Arc::clone(&shared.transport);
        tokio::spawn(async move {
            if let Err(e) = transport.send_to(addr, method::HEARTBEAT_ACK, "").await {
                warn!(%addr, error = %e, "heartbeat ack failed");
            }
        });
    }

    if hb.synced {
        if record.offset.is_some() {
            // The client acknowledged the offset we delivered.
            shared.registry.set_state(addr, SyncState::Synced);
        } else {
            // The client claims an offset this leader never negotiated
            // (leader restart): renegotiate.
            maybe_start_burst(shared, addr);
        }
    } else {
        maybe_start_burst(shared, addr);
    }
}

/// Start an SNTP burst for `addr` unless one is already in flight.
fn maybe_start_burst(shared: &Arc<LeaderShared>, addr: SocketAddr) {
    {
        let mut in_flight = shared.in_flight.lock().unwrap();
        if !in_flight.insert(addr) {
            return;
        }
    }
    shared.registry.set_state(addr, SyncState::Syncing);

    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        run_sntp_exchange(shared, addr).await;
    });
}

#[instrument(name = "sntp_exchange", skip(shared))]
async fn run_sntp_exchange(shared: Arc<LeaderShared>, addr: SocketAddr) {
    let (tx, mut rx) = mpsc::channel(shared.sntp.burst_size.max(1));
    shared.pending_sntp.lock().unwrap().insert(addr, tx);

    let outcome = drive_bursts(&shared, addr, &mut rx).await;

    shared.pending_sntp.lock().unwrap().remove(&addr);
    shared.in_flight.lock().unwrap().remove(&addr);

    match outcome {
        Some(offset) => {
            let payload = OffsetUpdate { offset }.encode();
            match shared
                .transport
                .send_to(addr, method::OFFSET_UPDATE, &payload)
                .await
            {
                Ok(()) => {
                    shared.registry.set_offset(addr, offset);
                    // Stays `syncing` until the client acknowledges the
                    // offset through its next heartbeat.
                    info!(
                        %addr,
                        offset_ns = offset.offset_ns,
                        error_bound_ns = offset.error_bound_ns,
                        "offset delivered"
                    );
                }
                Err(e) => {
                    warn!(%addr, error = %e, "offset delivery failed");
                    shared.registry.set_state(addr, SyncState::Unsynced);
                }
            }
        }
        None => {
            warn!(%addr, "sntp negotiation failed, client unsynced");
            shared.registry.set_state(addr, SyncState::Unsynced);
        }
    }
}

/// Retry bursts up to the configured limit.
async fn drive_bursts(
    shared: &LeaderShared,
    addr: SocketAddr,
    rx: &mut mpsc::Receiver<SntpResp>,
) -> Option<ClockOffset> {
    for attempt in 1..=shared.sntp.max_retries {
        match drive_one_burst(shared, addr, rx).await {
            Some(offset) => {
                histogram!("shutter_sync_sntp_error_bound_ns")
                    .record(offset.error_bound_ns as f64);
                return Some(offset);
            }
            None => warn!(%addr, attempt, "sntp burst abandoned"),
        }
    }
    None
}

/// One burst: `burst_size` exchanges spaced `spacing_ms`, each bounded by
/// the per-sample deadline. Returns the min-RTT offset, or None when a
/// sample deadline expires.
async fn drive_one_burst(
    shared: &LeaderShared,
    addr: SocketAddr,
    rx: &mut mpsc::Receiver<SntpResp>,
) -> Option<ClockOffset> {
    let config = &shared.sntp;
    let deadline = Duration::from_millis(config.sample_deadline_ms);
    let mut burst = SntpBurst::new();

    for _ in 0..config.burst_size {
        let t0 = Ticker::global().now_ns();
        let payload = SntpReq { t0 }.encode();
        if let Err(e) = shared
            .transport
            .send_to(addr, method::SNTP_REQ, &payload)
            .await
        {
            warn!(%addr, error = %e, "sntp request send failed");
            return None;
        }

        // Await the response to *this* request; stale responses from an
        // abandoned burst are drained by the t0 match.
        let resp = loop {
            match timeout(deadline, rx.recv()).await {
                Ok(Some(resp)) if resp.t0 == t0 => break resp,
                Ok(Some(stale)) => {
                    debug!(%addr, stale_t0 = stale.t0, "stale sntp response drained");
                }
                Ok(None) | Err(_) => return None,
            }
        };
        let t3 = Ticker::global().now_ns();

        burst.add_sample(SntpSample {
            t0,
            t1: resp.t1,
            t2: resp.t2,
            t3,
        });

        sleep(Duration::from_millis(config.spacing_ms)).await;
    }

    burst.best_offset()
}
