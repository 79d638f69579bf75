//! The client controller.
//!
//! Advertises itself through periodic heartbeats, answers SNTP requests,
//! installs negotiated offsets, and relays leader broadcasts into the
//! local capture pipeline as commands.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clock::{Ticker, TimeDomainConverter};
use contracts::{NodeBlueprint, SyncCommand, SyncError};
use rpc::{method, ClientTransport, Heartbeat, OffsetUpdate, SntpReq, SntpResp, TriggerTime, TwoA};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// The client-side synchronization controller.
pub struct SoftwareSyncClient {
    transport: Arc<ClientTransport>,
    converter: Arc<TimeDomainConverter>,
    heartbeat_task: JoinHandle<()>,
}

impl SoftwareSyncClient {
    /// Bind the client transport, register the protocol handlers, and
    /// start the heartbeat loop.
    #[instrument(name = "client_start", skip_all, fields(client_id = %blueprint.node.client_id))]
    pub async fn start(
        blueprint: &NodeBlueprint,
        converter: Arc<TimeDomainConverter>,
        commands: mpsc::Sender<SyncCommand>,
    ) -> Result<Self, SyncError> {
        let transport = Arc::new(ClientTransport::bind(&blueprint.rpc).await?);

        register_handlers(&transport, &converter, commands);

        let heartbeat_task = {
            let transport = Arc::clone(&transport);
            let converter = Arc::clone(&converter);
            let client_id = blueprint.node.client_id.clone();
            let period = Duration::from_millis(blueprint.heartbeat.period_ms);
            tokio::spawn(async move {
                loop {
                    let payload = Heartbeat {
                        client_id: client_id.clone(),
                        synced: converter.is_synced(),
                    }
                    .encode();
                    if let Err(e) = transport.send(method::HEARTBEAT, &payload).await {
                        // Expected while the leader is unreachable.
                        debug!(error = %e, "heartbeat send failed");
                    }
                    sleep(period).await;
                }
            })
        };

        info!("software sync client started");

        Ok(Self {
            transport,
            converter,
            heartbeat_task,
        })
    }

    /// Whether a leader-negotiated offset is installed.
    pub fn is_synced(&self) -> bool {
        self.converter.is_synced()
    }

    /// The latched leader address, once discovered.
    pub fn leader_addr(&self) -> Option<SocketAddr> {
        self.transport.leader_addr()
    }

    /// Stop the heartbeat loop and the transport.
    pub fn close(&self) {
        self.heartbeat_task.abort();
        self.transport.close();
        debug!("software sync client closed");
    }
}

impl Drop for SoftwareSyncClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn register_handlers(
    transport: &Arc<ClientTransport>,
    converter: &Arc<TimeDomainConverter>,
    commands: mpsc::Sender<SyncCommand>,
) {
    // HEARTBEAT_ACK: the first reply latches the leader's address.
    {
        let transport_ref = Arc::clone(transport);
        transport.register_handler(
            method::HEARTBEAT_ACK,
            Arc::new(move |addr, _| {
                transport_ref.latch_leader(addr);
            }),
        );
    }

    // SNTP_REQ: record t1 on arrival, echo t2 on send.
    {
        let transport_ref = Arc::clone(transport);
        transport.register_handler(
            method::SNTP_REQ,
            Arc::new(move |addr, payload| {
                let t1 = Ticker::global().now_ns();
                let req = match SntpReq::parse(&payload) {
                    Ok(req) => req,
                    Err(e) => {
                        warn!(error = %e, "bad sntp request discarded");
                        return;
                    }
                };
                transport_ref.latch_leader(addr);

                let transport = Arc::clone(&transport_ref);
                tokio::spawn(async move {
                    let resp = SntpResp {
                        t0: req.t0,
                        t1,
                        t2: Ticker::global().now_ns(),
                    };
                    if let Err(e) = transport.send(method::SNTP_RESP, &resp.encode()).await {
                        warn!(error = %e, "sntp response send failed");
                    }
                });
            }),
        );
    }

    // OFFSET_UPDATE: install unconditionally; latest wins.
    {
        let transport_ref = Arc::clone(transport);
        let converter = Arc::clone(converter);
        transport.register_handler(
            method::OFFSET_UPDATE,
            Arc::new(move |addr, payload| {
                let update = match OffsetUpdate::parse(&payload) {
                    Ok(update) => update,
                    Err(e) => {
                        warn!(error = %e, "bad offset update discarded");
                        return;
                    }
                };
                transport_ref.latch_leader(addr);
                converter.install(update.offset);
                info!(
                    offset_ns = update.offset.offset_ns,
                    error_bound_ns = update.offset.error_bound_ns,
                    "synced to leader"
                );
            }),
        );
    }

    // Broadcast commands relay into the local pipeline.
    {
        let commands_trigger = commands.clone();
        transport.register_handler(
            method::SET_TRIGGER_TIME,
            Arc::new(move |_, payload| {
                let trigger = match TriggerTime::parse(&payload) {
                    Ok(trigger) => trigger,
                    Err(e) => {
                        warn!(error = %e, "bad trigger time discarded");
                        return;
                    }
                };
                relay(
                    &commands_trigger,
                    SyncCommand::Trigger {
                        goal_leader_ns: trigger.goal_leader_ns,
                    },
                );
            }),
        );
    }
    {
        let commands_2a = commands.clone();
        transport.register_handler(
            method::SET_2A,
            Arc::new(move |_, payload| {
                let two_a = match TwoA::parse(&payload) {
                    Ok(two_a) => two_a,
                    Err(e) => {
                        warn!(error = %e, "bad 2a update discarded");
                        return;
                    }
                };
                relay(
                    &commands_2a,
                    SyncCommand::Preview2A {
                        exposure_ns: two_a.exposure_ns,
                        sensitivity: two_a.sensitivity,
                    },
                );
            }),
        );
    }
    {
        transport.register_handler(
            method::DO_PHASE_ALIGN,
            Arc::new(move |_, _| {
                relay(&commands, SyncCommand::PhaseAlign);
            }),
        );
    }
}

fn relay(commands: &mpsc::Sender<SyncCommand>, command: SyncCommand) {
    if commands.try_send(command).is_err() {
        warn!(?command, "command queue full, leader command dropped");
    }
}
