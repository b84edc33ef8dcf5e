//! The `peer` module federates this router with other routers.
//!
//! - `PeerLink`: one self-healing outbound connection to a peer router.
//! - `Bridge`: plugs a `PeerLink` into the router's dispatch loop.
//! - `LinkState` / `PeerSnapshot`: lifecycle state and its introspection view.

pub mod bridge;
pub mod link;
pub mod state;

pub use bridge::Bridge;
pub use link::{PEER_PATH, PeerLink, QUEUE_CAPACITY};
pub use state::{LinkState, PeerSnapshot};
