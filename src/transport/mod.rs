//! The `transport` module is responsible for network communication with
//! attached subscribers and peer routers over WebSockets.
//!
//! It defines how a `Message` maps onto WebSocket frames and implements the
//! attach endpoint itself: accepting connections, upgrading them, and running
//! each subscriber link's pumps against the router.

pub mod message;
pub mod websocket;

#[cfg(test)]
mod tests;

pub use message::{Inbound, decode, encode};
pub use websocket::{serve, serve_client, start_websocket_server};
