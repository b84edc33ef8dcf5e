//! The broker crate module contains the dispatch core: the `Message` value,
//! the static `RoutingTable`, and the `Router` loop that rewrites and fans
//! messages out to subscribers and peer routers.
//!
//! Public types:
//! - `Router`: owns the live-sets; `Router::start` spawns its loop.
//! - `RouterHandle`: cloneable message-passing front used by every link.

pub mod message;
pub mod router;
pub mod routing;

pub use message::Message;
pub use router::{INBOUND_CAPACITY, Router, RouterHandle, RouterStats};
pub use routing::RoutingTable;

#[cfg(test)]
mod tests;
