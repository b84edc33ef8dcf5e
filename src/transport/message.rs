//! Frame codec
//!
//! Translates between `Message` and WebSocket frames. Data frames carry one
//! JSON-encoded `Message` each; text and binary frames are both accepted on
//! receive. Ping, pong and close are transport control frames and are
//! surfaced as their own variants, never decoded as messages.

use std::time::Duration;

use futures_util::{Sink, SinkExt};
use tokio::time::timeout;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::Message;
use crate::utils::{BrokerError, Result};

/// What a reader pump got from one frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    Message(Message),
    Ping,
    Pong,
    Close,
}

pub fn encode(message: &Message) -> Result<WsMessage> {
    Ok(WsMessage::text(serde_json::to_string(message)?))
}

pub fn decode(frame: WsMessage) -> Result<Inbound> {
    let inbound = match frame {
        WsMessage::Text(text) => Inbound::Message(serde_json::from_str(text.as_str())?),
        WsMessage::Binary(data) => Inbound::Message(serde_json::from_slice(&data)?),
        WsMessage::Ping(_) => Inbound::Ping,
        WsMessage::Pong(_) => Inbound::Pong,
        // a read never yields a raw frame
        WsMessage::Close(_) | WsMessage::Frame(_) => Inbound::Close,
    };
    Ok(inbound)
}

/// Write one frame, giving up after `write_wait`.
pub async fn send<S>(sink: &mut S, frame: WsMessage, write_wait: Duration) -> Result<()>
where
    S: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
{
    timeout(write_wait, sink.send(frame))
        .await
        .map_err(|_| BrokerError::WriteTimeout(write_wait))??;
    Ok(())
}

pub async fn send_message<S>(sink: &mut S, message: &Message, write_wait: Duration) -> Result<()>
where
    S: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
{
    send(sink, encode(message)?, write_wait).await
}
