//! The `error` module defines the error type shared by every `poproute` module.
//!
//! Link-level failures (dial, handshake, decode, write) are reported through
//! `BrokerError` to the task that owns the link. They are logged there and end
//! that link only; nothing here is fatal to the router.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// Dialling a peer router failed before the WebSocket was established.
    #[error("failed opening websocket with {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: tungstenite::Error,
    },

    /// The peer accepted TCP but did not finish the upgrade in time.
    #[error("handshake with {address} timed out after {timeout:?}")]
    HandshakeTimeout { address: String, timeout: Duration },

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// A frame body was not a valid `{"header", "body"}` document.
    #[error("malformed message: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("router is no longer running")]
    RouterClosed,

    #[error("peer link to {0} has already been started")]
    AlreadyStarted(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, BrokerError>;
