//! Peer link
//!
//! A `PeerLink` is this router's long-lived connection to one peer router.
//! It outlives any single WebSocket: when the connection dies the link
//! reconnects, forever, with a fixed backoff between dial attempts.
//!
//! Each connection is served by two pumps:
//! - the reader decodes frames, keeps the messages whose topic is in the
//!   link's filter set and queues them for the bridge. Pings from the peer
//!   refresh its read deadline; tungstenite answers them with pongs.
//! - the writer drains the outbound queue onto the socket.
//!
//! Either pump ending tells the other to stop. Once both have finished the
//! link's driver task dials again, so a new connection never races a half
//! torn-down one. The outbound queue belongs to the driver, not to a
//! connection: messages still queued when a connection dies go out on the
//! next one, a message whose write failed is lost.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::{Instant, sleep, timeout, timeout_at};
use tokio_tungstenite::{WebSocketStream, client_async};
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::Message;
use crate::config::LinkTiming;
use crate::peer::state::{LinkState, PeerSnapshot, SharedStatus};
use crate::transport::message::{Inbound, decode, send, send_message};
use crate::utils::{BrokerError, Result};

/// Capacity of both the inbound and the outbound queue of a peer link.
pub const QUEUE_CAPACITY: usize = 4096;

/// Path peer routers accept links on.
pub const PEER_PATH: &str = "/subscribe";

type PeerStream = WebSocketStream<TcpStream>;

pub struct PeerLink {
    name: String,
    address: String,
    filters: Arc<BTreeSet<String>>,
    outbound: mpsc::Sender<Message>,
    inbound: Mutex<mpsc::Receiver<Message>>,
    status: SharedStatus,
    driver: StdMutex<Option<Driver>>,
}

impl PeerLink {
    /// Build a link in `standby`. Nothing is dialled until `connect`.
    pub fn new<I, T>(address: impl Into<String>, filters: I, timing: LinkTiming) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let address = address.into();
        let filters: Arc<BTreeSet<String>> =
            Arc::new(filters.into_iter().map(Into::into).collect());
        let (outbound, outbound_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (inbound_tx, inbound) = mpsc::channel(QUEUE_CAPACITY);
        let status = SharedStatus::new();

        let driver = Driver {
            address: address.clone(),
            filters: Arc::clone(&filters),
            outbound: outbound_rx,
            inbound: inbound_tx,
            status: status.clone(),
            timing,
        };

        Self {
            name: address.clone(),
            address,
            filters,
            outbound,
            inbound: Mutex::new(inbound),
            status,
            driver: StdMutex::new(Some(driver)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn filters(&self) -> &BTreeSet<String> {
        &self.filters
    }

    pub fn state(&self) -> LinkState {
        self.status.state()
    }

    pub fn snapshot(&self) -> PeerSnapshot {
        self.status.snapshot(&self.address, &self.filters)
    }

    /// Dial the peer once. On success the pumps are running and the link is
    /// `active`. On failure the link keeps retrying in the background and the
    /// dial error is returned for the caller to log. Either way the link now
    /// reconnects on its own; calling this twice is an error.
    pub async fn connect(&self) -> Result<()> {
        let driver = self
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| BrokerError::AlreadyStarted(self.address.clone()))?;

        self.status.set_state(LinkState::Connecting);
        match dial(&self.address, driver.timing.handshake_timeout).await {
            Ok((stream, connection)) => {
                info!(peer = %self.name, %connection, "connected to peer router, starting pumps");
                self.status.connected(connection);
                tokio::spawn(driver.run(Some(stream)));
                Ok(())
            }
            Err(e) => {
                warn!(peer = %self.name, "opening connection failed, retrying");
                self.status.set_state(LinkState::Retrying);
                tokio::spawn(driver.run(None));
                Err(e)
            }
        }
    }

    /// Queue a message for the peer, waiting while the outbound queue is full.
    pub async fn write(&self, message: Message) {
        if self.outbound.send(message).await.is_err() {
            warn!(peer = %self.name, "peer link stopped, dropping outbound message");
        }
    }

    /// Next message the peer sent that passed the filter. `None` once the
    /// link's driver has stopped.
    pub async fn read(&self) -> Option<Message> {
        self.inbound.lock().await.recv().await
    }
}

impl std::fmt::Debug for PeerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerLink")
            .field("name", &self.name)
            .field("filters", &self.filters)
            .field("state", &self.status.state())
            .finish()
    }
}

/// Owns everything that must survive a reconnect.
struct Driver {
    address: String,
    filters: Arc<BTreeSet<String>>,
    outbound: mpsc::Receiver<Message>,
    inbound: mpsc::Sender<Message>,
    status: SharedStatus,
    timing: LinkTiming,
}

impl Driver {
    async fn run(mut self, mut connected: Option<PeerStream>) {
        loop {
            let stream = match connected.take() {
                Some(stream) => stream,
                None => match self.redial().await {
                    Some(stream) => stream,
                    None => break,
                },
            };

            self.pump(stream).await;

            if self.inbound.is_closed() {
                break;
            }
            self.status.set_state(LinkState::Retrying);
        }
        debug!(peer = %self.address, "peer link dropped, driver stopped");
    }

    /// Serve one connection until both pumps have finished.
    async fn pump(&mut self, stream: PeerStream) {
        let (sink, stream) = stream.split();
        let (reader_alive, reader_gone) = oneshot::channel::<()>();
        let (writer_alive, writer_gone) = oneshot::channel::<()>();

        let reader = tokio::spawn(read_pump(
            stream,
            self.address.clone(),
            Arc::clone(&self.filters),
            self.inbound.clone(),
            self.status.clone(),
            self.timing.ping_wait,
            reader_alive,
            writer_gone,
        ));

        write_pump(
            sink,
            &mut self.outbound,
            &self.address,
            self.timing.write_wait,
            reader_gone,
        )
        .await;
        drop(writer_alive);

        warn!(peer = %self.address, "connection to peer router is dying, trying to resurrect");
        if let Err(e) = reader.await {
            warn!(peer = %self.address, error = %e, "read pump failed");
        }
        self.status.disconnected(LinkState::Down);
        debug!(peer = %self.address, "read and write pumps closed");
    }

    /// Dial until it works. `None` if the link was dropped meanwhile.
    async fn redial(&self) -> Option<PeerStream> {
        info!(peer = %self.address, "retrying connection");
        loop {
            if self.inbound.is_closed() {
                return None;
            }

            self.status.set_state(LinkState::Connecting);
            match dial(&self.address, self.timing.handshake_timeout).await {
                Ok((stream, connection)) => {
                    info!(peer = %self.address, %connection, "retry success, starting pumps");
                    self.status.connected(connection);
                    return Some(stream);
                }
                Err(e) => {
                    self.status.set_state(LinkState::Retrying);
                    warn!(
                        peer = %self.address,
                        error = %e,
                        "retry failed, trying again in {:?}",
                        self.timing.retry_interval
                    );
                    sleep(self.timing.retry_interval).await;
                }
            }
        }
    }
}

/// Open `ws://<address>/subscribe`. The TCP connect and the upgrade share
/// one `handshake_timeout`.
async fn dial(address: &str, handshake_timeout: Duration) -> Result<(PeerStream, String)> {
    let url = format!("ws://{address}{PEER_PATH}");
    let attempt = async {
        let tcp = TcpStream::connect(address).await?;
        let connection = format!("{} => {}", tcp.local_addr()?, tcp.peer_addr()?);
        let (stream, _response) = client_async(url.as_str(), tcp).await?;
        Ok::<_, tungstenite::Error>((stream, connection))
    };

    match timeout(handshake_timeout, attempt).await {
        Ok(Ok(connected)) => Ok(connected),
        Ok(Err(source)) => Err(BrokerError::Dial {
            address: address.to_string(),
            source,
        }),
        Err(_) => Err(BrokerError::HandshakeTimeout {
            address: address.to_string(),
            timeout: handshake_timeout,
        }),
    }
}

#[allow(clippy::too_many_arguments)]
async fn read_pump(
    mut stream: SplitStream<PeerStream>,
    address: String,
    filters: Arc<BTreeSet<String>>,
    inbound: mpsc::Sender<Message>,
    status: SharedStatus,
    ping_wait: Duration,
    _alive: oneshot::Sender<()>,
    mut writer_gone: oneshot::Receiver<()>,
) {
    let mut deadline = Instant::now() + ping_wait;

    loop {
        let frame = tokio::select! {
            frame = timeout_at(deadline, stream.next()) => frame,
            _ = &mut writer_gone => return,
        };

        let frame = match frame {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                warn!(peer = %address, error = %e, "read from peer router failed");
                break;
            }
            Ok(None) => {
                info!(peer = %address, "peer router closed the connection");
                break;
            }
            Err(_) => {
                warn!(peer = %address, "no ping from peer router within {ping_wait:?}");
                break;
            }
        };

        match decode(frame) {
            Ok(Inbound::Message(message)) => {
                if !filters.contains(&message.topic) {
                    continue;
                }
                tokio::select! {
                    sent = inbound.send(message) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                    _ = &mut writer_gone => return,
                }
            }
            Ok(Inbound::Ping) => {
                debug!(peer = %address, "ping");
                deadline = Instant::now() + ping_wait;
                status.pinged();
            }
            Ok(Inbound::Pong) => {}
            Ok(Inbound::Close) => {
                info!(peer = %address, "peer router sent close");
                break;
            }
            Err(e) => {
                warn!(peer = %address, error = %e, "undecodable frame from peer router");
                break;
            }
        }
    }

    status.disconnected(LinkState::Disconnecting);
}

async fn write_pump(
    mut sink: SplitSink<PeerStream, WsMessage>,
    outbound: &mut mpsc::Receiver<Message>,
    address: &str,
    write_wait: Duration,
    mut reader_gone: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            message = outbound.recv() => {
                let Some(message) = message else {
                    let _ = send(&mut sink, WsMessage::Close(None), write_wait).await;
                    return;
                };
                if let Err(e) = send_message(&mut sink, &message, write_wait).await {
                    warn!(peer = %address, error = %e, "write to peer router failed");
                    return;
                }
            }
            _ = &mut reader_gone => return,
        }
    }
}
