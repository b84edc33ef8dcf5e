//! WebSocket transport
//!
//! This file implements the attach endpoint subscribers and peer routers
//! dial into. Responsibilities:
//! - Accept TCP connections and upgrade them on the configured path only
//! - Create a `ClientLink` for each connection and register it with the router
//! - Run the link's reader and writer pumps until either side fails
//!
//! The reader forwards every decoded message into the router's inbound queue
//! and keeps a read deadline that only a pong refreshes. The writer drains the
//! link's outbound queue and pings on a timer shorter than that deadline. When
//! the router closes the outbound queue (unregistration or eviction) the
//! writer sends a close frame and stops; when the reader stops it asks the
//! router to unregister the link, which closes the queue.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout_at};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};
use tracing::{debug, info, warn};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::{Message, RouterHandle};
use crate::client::{ClientId, ClientLink};
use crate::config::{LinkTiming, Settings};
use crate::transport::message::{Inbound, decode, send, send_message};
use crate::utils::Result;

type ClientStream = WebSocketStream<TcpStream>;

/// Bind `addr` and serve the attach endpoint. Only returns if binding fails.
pub async fn start_websocket_server(
    addr: String,
    router: RouterHandle,
    settings: Settings,
) -> Result<()> {
    let listener = TcpListener::bind(&addr).await?;

    info!("WebSocket server listening on ws://{addr}{}", settings.server.path);

    serve(
        listener,
        router,
        settings.server.path.clone(),
        LinkTiming::from(&settings.link),
    )
    .await;
    Ok(())
}

/// Accept connections on `listener` forever, one `ClientLink` each.
pub async fn serve(listener: TcpListener, router: RouterHandle, path: String, timing: LinkTiming) {
    let path: Arc<str> = Arc::from(path);

    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };

        let router = router.clone();
        let path = Arc::clone(&path);

        tokio::spawn(async move {
            let check_path = move |request: &Request, response: Response| {
                if request.uri().path() == &*path {
                    Ok(response)
                } else {
                    let mut rejection = ErrorResponse::new(Some(format!(
                        "no endpoint at {}",
                        request.uri().path()
                    )));
                    *rejection.status_mut() = StatusCode::NOT_FOUND;
                    Err(rejection)
                }
            };

            let ws_stream = match accept_hdr_async(stream, check_path).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!(%remote, "WebSocket handshake error: {e}");
                    return;
                }
            };

            serve_client(ws_stream, remote.to_string(), router, timing).await;
        });
    }
}

/// Run one attached connection from registration to close.
pub async fn serve_client(
    ws_stream: ClientStream,
    remote: String,
    router: RouterHandle,
    timing: LinkTiming,
) {
    let (link, outbound) = ClientLink::new(remote.clone());
    let client_id = link.id.clone();

    if router.register(link).await.is_err() {
        warn!(%remote, "router is not running, dropping connection");
        return;
    }
    info!(client = %client_id, %remote, "link registered");

    let (ws_sender, ws_receiver) = ws_stream.split();
    let (writer_alive, writer_gone) = oneshot::channel::<()>();

    let writer = tokio::spawn(write_pump(
        ws_sender,
        outbound,
        client_id.clone(),
        timing,
        writer_alive,
    ));

    read_pump(ws_receiver, &router, &client_id, timing.pong_wait, writer_gone).await;

    let _ = router.unregister(client_id.clone()).await;
    if let Err(e) = writer.await {
        warn!(client = %client_id, error = %e, "write pump failed");
    }
    info!(client = %client_id, %remote, "link closed");
}

async fn read_pump(
    mut ws_receiver: SplitStream<ClientStream>,
    router: &RouterHandle,
    client_id: &ClientId,
    pong_wait: Duration,
    mut writer_gone: oneshot::Receiver<()>,
) {
    let mut deadline = Instant::now() + pong_wait;

    loop {
        let frame = tokio::select! {
            frame = timeout_at(deadline, ws_receiver.next()) => frame,
            _ = &mut writer_gone => break,
        };

        let frame = match frame {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                debug!(client = %client_id, error = %e, "read failed");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                info!(client = %client_id, "no pong within {pong_wait:?}");
                break;
            }
        };

        match decode(frame) {
            Ok(Inbound::Message(message)) => {
                if router.publish(message).await.is_err() {
                    break;
                }
            }
            Ok(Inbound::Pong) => {
                debug!(client = %client_id, "pong");
                deadline = Instant::now() + pong_wait;
            }
            Ok(Inbound::Ping) => {}
            Ok(Inbound::Close) => break,
            Err(e) => {
                warn!(client = %client_id, error = %e, "invalid message, closing link");
                break;
            }
        }
    }

    debug!(client = %client_id, "read pump closing");
}

async fn write_pump(
    mut ws_sender: SplitSink<ClientStream, WsMessage>,
    mut outbound: mpsc::Receiver<Message>,
    client_id: ClientId,
    timing: LinkTiming,
    _alive: oneshot::Sender<()>,
) {
    debug!(client = %client_id, "starting write pump with a ping timer of {:?}", timing.ping_period);
    let mut ticker = interval_at(Instant::now() + timing.ping_period, timing.ping_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            message = outbound.recv() => {
                let Some(message) = message else {
                    // the router closed the queue
                    let _ = send(&mut ws_sender, WsMessage::Close(None), timing.write_wait).await;
                    break;
                };
                if let Err(e) = send_message(&mut ws_sender, &message, timing.write_wait).await {
                    debug!(client = %client_id, error = %e, "failed to send message");
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = send(&mut ws_sender, WsMessage::Ping(Default::default()), timing.write_wait).await {
                    debug!(client = %client_id, error = %e, "failed to send ping");
                    break;
                }
            }
        }
    }

    debug!(client = %client_id, "send loop closed");
}
