//! Router
//!
//! This module contains the dispatch core. One task owns the routing table,
//! the live-set of subscriber links and the live-set of peer bridges, and is
//! the only code that ever touches them:
//! - registration and unregistration of subscribers
//! - attaching peer bridges and answering introspection queries
//! - rewriting each inbound message per the routing table and fanning it out
//!
//! Everything else talks to the loop through a cloneable `RouterHandle`, so
//! the live-sets need no locks.
//!
//! Delivery policy:
//! - subscribers get a non-blocking send; a subscriber whose queue is full is
//!   evicted on the spot (its queue is closed by dropping the link) and the
//!   message is not retried for it
//! - peers get a blocking send; a saturated peer queue stalls dispatch to
//!   every target until it drains

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broker::message::Message;
use crate::broker::routing::RoutingTable;
use crate::client::{ClientId, ClientLink};
use crate::config::LinkTiming;
use crate::peer::{Bridge, PeerSnapshot};
use crate::utils::{BrokerError, Result};

/// Capacity of the router's inbound queue, shared by every reader.
pub const INBOUND_CAPACITY: usize = 1024;

const CONTROL_CAPACITY: usize = 64;

/// Live-set sizes, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterStats {
    pub clients: usize,
    pub bridges: usize,
}

enum Control {
    Register(ClientLink),
    Unregister(ClientId),
    AttachBridge(Arc<Bridge>),
    PeerInfo(oneshot::Sender<HashMap<String, PeerSnapshot>>),
    Stats(oneshot::Sender<RouterStats>),
    SetMessageLogs(bool),
}

pub struct Router {
    table: Arc<RoutingTable>,
    clients: HashMap<ClientId, ClientLink>,
    bridges: HashMap<String, Arc<Bridge>>,
    message_logs: bool,
}

impl Router {
    pub fn new(table: RoutingTable, message_logs: bool) -> Self {
        Self {
            table: Arc::new(table),
            clients: HashMap::new(),
            bridges: HashMap::new(),
            message_logs,
        }
    }

    /// Spawn the dispatch loop and return the handle used to reach it.
    pub fn start(self) -> RouterHandle {
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let handle = RouterHandle {
            control: control_tx,
            inbound: inbound_tx,
            table: Arc::clone(&self.table),
        };
        tokio::spawn(self.run(control_rx, inbound_rx));
        handle
    }

    async fn run(
        mut self,
        mut control: mpsc::Receiver<Control>,
        mut inbound: mpsc::Receiver<Message>,
    ) {
        info!(routes = self.table.len(), "router started");
        loop {
            tokio::select! {
                Some(command) = control.recv() => self.handle(command),
                Some(message) = inbound.recv() => self.route(message).await,
                else => break,
            }
        }
        info!("router stopped");
    }

    fn handle(&mut self, command: Control) {
        match command {
            Control::Register(link) => self.register(link),
            Control::Unregister(id) => {
                self.unregister(&id);
            }
            Control::AttachBridge(bridge) => self.attach_bridge(bridge),
            Control::PeerInfo(reply) => {
                let _ = reply.send(self.peer_info());
            }
            Control::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
            Control::SetMessageLogs(enabled) => self.message_logs = enabled,
        }
    }

    pub fn register(&mut self, link: ClientLink) {
        debug!(client = %link.id, remote = %link.remote, "registering subscriber");
        self.clients.insert(link.id.clone(), link);
    }

    /// Remove a subscriber, closing its outbound queue. Returns false if it
    /// was not live (already evicted or never registered).
    pub fn unregister(&mut self, id: &ClientId) -> bool {
        match self.clients.remove(id) {
            Some(link) => {
                debug!(client = %id, remote = %link.remote, "unregistered subscriber");
                true
            }
            None => false,
        }
    }

    pub fn attach_bridge(&mut self, bridge: Arc<Bridge>) {
        info!(peer = %bridge.name(), "attached peer bridge");
        self.bridges.insert(bridge.name().to_string(), bridge);
    }

    pub fn contains_client(&self, id: &ClientId) -> bool {
        self.clients.contains_key(id)
    }

    pub fn stats(&self) -> RouterStats {
        RouterStats {
            clients: self.clients.len(),
            bridges: self.bridges.len(),
        }
    }

    pub fn peer_info(&self) -> HashMap<String, PeerSnapshot> {
        self.bridges
            .iter()
            .map(|(name, bridge)| (name.clone(), bridge.snapshot()))
            .collect()
    }

    /// Rewrite `message` per the routing table and deliver one copy per
    /// output topic to every live subscriber and peer. Unknown topics are
    /// dropped silently.
    pub async fn route(&mut self, message: Message) {
        if self.message_logs {
            info!(header = %message.topic, "routing a message");
        }

        let Some(outputs) = self.table.lookup(&message.topic) else {
            return;
        };

        for topic in outputs {
            let routed = message.relabel(topic);
            if self.message_logs {
                info!(header = %topic, "routing to");
            }

            let message_logs = self.message_logs;
            self.clients.retain(|id, link| {
                if message_logs {
                    info!(client = %id, remote = %link.remote, "sending to subscriber");
                }
                match link.sender.try_send(routed.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        warn!(client = %id, remote = %link.remote, "outbound queue full, dropping subscriber");
                        false
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!(client = %id, "subscriber writer already gone");
                        false
                    }
                }
            });

            for bridge in self.bridges.values() {
                if message_logs {
                    info!(peer = %bridge.name(), "sending to peer router");
                }
                bridge.write_passthrough(routed.clone()).await;
            }
        }
    }
}

/// Cloneable front of the dispatch loop.
#[derive(Debug, Clone)]
pub struct RouterHandle {
    control: mpsc::Sender<Control>,
    inbound: mpsc::Sender<Message>,
    table: Arc<RoutingTable>,
}

impl RouterHandle {
    async fn send(&self, command: Control) -> Result<()> {
        self.control
            .send(command)
            .await
            .map_err(|_| BrokerError::RouterClosed)
    }

    pub async fn register(&self, link: ClientLink) -> Result<()> {
        self.send(Control::Register(link)).await
    }

    pub async fn unregister(&self, id: ClientId) -> Result<()> {
        self.send(Control::Unregister(id)).await
    }

    /// Hand a message to the dispatch loop, waiting while the inbound queue
    /// is full.
    pub async fn publish(&self, message: Message) -> Result<()> {
        self.inbound
            .send(message)
            .await
            .map_err(|_| BrokerError::RouterClosed)
    }

    pub async fn attach_bridge(&self, bridge: Arc<Bridge>) -> Result<()> {
        self.send(Control::AttachBridge(bridge)).await
    }

    /// Snapshot of every attached peer, keyed by peer name.
    pub async fn peer_info(&self) -> Result<HashMap<String, PeerSnapshot>> {
        let (reply, response) = oneshot::channel();
        self.send(Control::PeerInfo(reply)).await?;
        response.await.map_err(|_| BrokerError::RouterClosed)
    }

    pub async fn stats(&self) -> Result<RouterStats> {
        let (reply, response) = oneshot::channel();
        self.send(Control::Stats(reply)).await?;
        response.await.map_err(|_| BrokerError::RouterClosed)
    }

    pub async fn set_message_logs(&self, enabled: bool) -> Result<()> {
        self.send(Control::SetMessageLogs(enabled)).await
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Dial every peer router concurrently. Each peer only forwards the topics
    /// this router has routes for. A failed first dial is logged; the bridge
    /// is attached anyway and its link keeps retrying in the background.
    /// An address listed more than once gets a single bridge.
    pub fn connect_to_peers(&self, peers: &[String], timing: LinkTiming) -> Vec<JoinHandle<()>> {
        let filters = self.table.topics();
        info!(?filters, "peer filters");

        let mut seen = HashSet::new();
        peers
            .iter()
            .filter(|address| {
                let first = seen.insert(address.as_str());
                if !first {
                    warn!(peer = %address, "peer listed more than once, dialling it once");
                }
                first
            })
            .map(|address| {
                let router = self.clone();
                let address = address.clone();
                let filters = filters.clone();
                tokio::spawn(async move {
                    info!(peer = %address, "connecting to peer router");
                    let (bridge, connected) =
                        Bridge::start(&address, filters, router.clone(), timing).await;
                    match connected {
                        Ok(()) => info!(peer = %address, "done connecting to peer"),
                        Err(e) => warn!(peer = %address, error = %e, "could not establish connection to peer"),
                    }
                    if router.attach_bridge(Arc::clone(&bridge)).await.is_err() {
                        return;
                    }
                    bridge.read_passthrough().await;
                })
            })
            .collect()
    }
}
