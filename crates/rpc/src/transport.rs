//! UDP endpoints with method-ID dispatch.
//!
//! One receive task per endpoint decodes datagrams and hands them to a
//! dispatch worker over a bounded queue; registered handlers run on the
//! worker and never block the receive loop.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use contracts::{RpcConfig, SyncError};
use metrics::counter;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::wire::{decode_frame, encode_frame, HEADER_BYTES, MAX_PAYLOAD_BYTES};
use crate::{method, netutil};

/// Handler invoked on the dispatch worker with the sender address and the
/// text payload.
pub type RpcHandler = Arc<dyn Fn(SocketAddr, String) + Send + Sync>;

/// Inbound datagrams queued between the receive loop and the dispatch worker.
const DISPATCH_QUEUE_CAPACITY: usize = 256;

struct Inbound {
    method_id: i32,
    addr: SocketAddr,
    payload: String,
}

/// Read-mostly method table. Registration takes the write lock; dispatch
/// clones the handler under the read lock.
#[derive(Default)]
pub struct HandlerRegistry {
    table: RwLock<HashMap<i32, RpcHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, method_id: i32, handler: RpcHandler) {
        let replaced = self
            .table
            .write()
            .unwrap()
            .insert(method_id, handler)
            .is_some();
        if replaced {
            warn!(
                method = method::name(method_id),
                method_id, "rpc handler replaced"
            );
        }
    }

    fn get(&self, method_id: i32) -> Option<RpcHandler> {
        self.table.read().unwrap().get(&method_id).cloned()
    }
}

async fn recv_loop(socket: Arc<UdpSocket>, tx: mpsc::Sender<Inbound>, endpoint: &'static str) {
    let mut buf = vec![0u8; HEADER_BYTES + MAX_PAYLOAD_BYTES];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, addr)) => match decode_frame(&buf[..len]) {
                Ok((method_id, payload)) => {
                    counter!(
                        "shutter_sync_rpc_received_total",
                        "method" => method::name(method_id)
                    )
                    .increment(1);
                    let inbound = Inbound {
                        method_id,
                        addr,
                        payload,
                    };
                    if tx.try_send(inbound).is_err() {
                        counter!("shutter_sync_rpc_dispatch_dropped_total").increment(1);
                        warn!(endpoint, "dispatch queue full, datagram dropped");
                    }
                }
                Err(e) => {
                    counter!("shutter_sync_rpc_malformed_total").increment(1);
                    warn!(endpoint, %addr, error = %e, "malformed datagram discarded");
                }
            },
            // Transient; on Linux a prior send to an unreachable port can
            // surface here as ECONNREFUSED.
            Err(e) => {
                warn!(endpoint, error = %e, "socket recv failed");
            }
        }
    }
}

async fn dispatch_loop(
    mut rx: mpsc::Receiver<Inbound>,
    handlers: Arc<HandlerRegistry>,
    endpoint: &'static str,
) {
    while let Some(msg) = rx.recv().await {
        match handlers.get(msg.method_id) {
            Some(handler) => {
                trace!(
                    endpoint,
                    method = method::name(msg.method_id),
                    from = %msg.addr,
                    "dispatching rpc"
                );
                handler(msg.addr, msg.payload);
            }
            None => {
                counter!("shutter_sync_rpc_unknown_total").increment(1);
                let err = SyncError::UnknownMethod {
                    method_id: msg.method_id,
                };
                warn!(endpoint, from = %msg.addr, error = %err, "rpc discarded");
            }
        }
    }
}

async fn send_frame(
    socket: &UdpSocket,
    addr: SocketAddr,
    method_id: i32,
    payload: &str,
) -> Result<(), SyncError> {
    let frame = encode_frame(method_id, payload)?;
    socket
        .send_to(&frame, addr)
        .await
        .map_err(|e| SyncError::transport(format!("send to {addr} failed: {e}")))?;
    counter!(
        "shutter_sync_rpc_sent_total",
        "method" => method::name(method_id)
    )
    .increment(1);
    Ok(())
}

/// The leader endpoint: bound to the well-known RPC port, tracking the
/// set of client addresses supplied by the membership layer.
pub struct LeaderTransport {
    socket: Arc<UdpSocket>,
    handlers: Arc<HandlerRegistry>,
    peers: RwLock<HashSet<SocketAddr>>,
    recv_task: JoinHandle<()>,
    dispatch_task: JoinHandle<()>,
}

impl LeaderTransport {
    /// Bind the leader socket and start the receive/dispatch tasks.
    #[instrument(name = "leader_transport_bind")]
    pub async fn bind(port: u16) -> Result<Self, SyncError> {
        let socket = Arc::new(UdpSocket::bind(("0.0.0.0", port)).await?);
        let handlers = Arc::new(HandlerRegistry::new());

        let (tx, rx) = mpsc::channel(DISPATCH_QUEUE_CAPACITY);
        let recv_task = tokio::spawn(recv_loop(Arc::clone(&socket), tx, "leader"));
        let dispatch_task = tokio::spawn(dispatch_loop(rx, Arc::clone(&handlers), "leader"));

        let local_addr = socket.local_addr()?;
        info!(%local_addr, "leader transport bound");

        Ok(Self {
            socket,
            handlers,
            peers: RwLock::new(HashSet::new()),
            recv_task,
            dispatch_task,
        })
    }

    /// The bound local address (useful when binding port 0 in tests).
    pub fn local_addr(&self) -> Result<SocketAddr, SyncError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn register_handler(&self, method_id: i32, handler: RpcHandler) {
        self.handlers.register(method_id, handler);
    }

    /// Track a client address for future broadcasts.
    pub fn add_peer(&self, addr: SocketAddr) {
        if self.peers.write().unwrap().insert(addr) {
            debug!(%addr, "peer added");
        }
    }

    pub fn remove_peer(&self, addr: SocketAddr) {
        if self.peers.write().unwrap().remove(&addr) {
            debug!(%addr, "peer removed");
        }
    }

    pub fn peers(&self) -> Vec<SocketAddr> {
        self.peers.read().unwrap().iter().copied().collect()
    }

    /// Unicast one RPC.
    pub async fn send_to(
        &self,
        addr: SocketAddr,
        method_id: i32,
        payload: &str,
    ) -> Result<(), SyncError> {
        send_frame(&self.socket, addr, method_id, payload).await
    }

    /// Send one RPC to every known client address. Send failures are
    /// logged per peer; the broadcast continues.
    #[instrument(name = "leader_broadcast", skip(self, payload), fields(method = method::name(method_id)))]
    pub async fn broadcast(&self, method_id: i32, payload: &str) -> Result<usize, SyncError> {
        // Validate once so an oversized payload fails before any send.
        let _ = encode_frame(method_id, payload)?;

        let peers = self.peers();
        let mut sent = 0;
        for addr in peers {
            match send_frame(&self.socket, addr, method_id, payload).await {
                Ok(()) => sent += 1,
                Err(e) => warn!(%addr, error = %e, "broadcast send failed"),
            }
        }
        Ok(sent)
    }

    /// Stop the receive and dispatch tasks.
    pub fn close(&self) {
        self.recv_task.abort();
        self.dispatch_task.abort();
        debug!("leader transport closed");
    }
}

impl Drop for LeaderTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// The client endpoint: bound to an ephemeral port, sending to the
/// interface broadcast address until the leader's address is latched
/// from its first reply.
pub struct ClientTransport {
    socket: Arc<UdpSocket>,
    handlers: Arc<HandlerRegistry>,
    leader_addr: RwLock<Option<SocketAddr>>,
    discovery_addr: SocketAddr,
    recv_task: JoinHandle<()>,
    dispatch_task: JoinHandle<()>,
}

impl ClientTransport {
    /// Bind the client socket and start the receive/dispatch tasks.
    #[instrument(name = "client_transport_bind", skip(config))]
    pub async fn bind(config: &RpcConfig) -> Result<Self, SyncError> {
        let socket = Arc::new(UdpSocket::bind(("0.0.0.0", 0)).await?);
        socket.set_broadcast(true)?;
        let handlers = Arc::new(HandlerRegistry::new());
        let discovery_addr = netutil::discovery_address(config);

        let (tx, rx) = mpsc::channel(DISPATCH_QUEUE_CAPACITY);
        let recv_task = tokio::spawn(recv_loop(Arc::clone(&socket), tx, "client"));
        let dispatch_task = tokio::spawn(dispatch_loop(rx, Arc::clone(&handlers), "client"));

        let local_addr = socket.local_addr()?;
        info!(%local_addr, %discovery_addr, "client transport bound");

        Ok(Self {
            socket,
            handlers,
            leader_addr: RwLock::new(None),
            discovery_addr,
            recv_task,
            dispatch_task,
        })
    }

    pub fn register_handler(&self, method_id: i32, handler: RpcHandler) {
        self.handlers.register(method_id, handler);
    }

    /// Remember the leader's address once a reply has been seen.
    pub fn latch_leader(&self, addr: SocketAddr) {
        let mut leader = self.leader_addr.write().unwrap();
        if *leader != Some(addr) {
            info!(%addr, "leader address latched");
            *leader = Some(addr);
        }
    }

    pub fn leader_addr(&self) -> Option<SocketAddr> {
        *self.leader_addr.read().unwrap()
    }

    /// Send one RPC to the leader, or to the discovery broadcast address
    /// while the leader is still unknown.
    pub async fn send(&self, method_id: i32, payload: &str) -> Result<(), SyncError> {
        let target = self.leader_addr().unwrap_or(self.discovery_addr);
        send_frame(&self.socket, target, method_id, payload).await
    }

    /// Stop the receive and dispatch tasks.
    pub fn close(&self) {
        self.recv_task.abort();
        self.dispatch_task.abort();
        debug!("client transport closed");
    }
}

impl Drop for ClientTransport {
    fn drop(&mut self) {
        self.close();
    }
}
