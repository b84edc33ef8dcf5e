//! Client link representation
//!
//! `ClientLink` is the router's record of one attached subscriber: an id,
//! the remote address for logs, and the sending side of the subscriber's
//! bounded outbound queue. The router is the only holder of the sender, so
//! removing a link from the router's live-set is what closes the queue and
//! tells the connection's writer to send a close frame and stop.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::broker::Message;

pub type ClientId = String;

/// Capacity of a subscriber's outbound queue. A subscriber that falls this
/// far behind is evicted.
pub const OUTBOUND_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct ClientLink {
    pub id: ClientId,
    pub remote: String,
    pub sender: mpsc::Sender<Message>,
}

impl ClientLink {
    /// Create a link record and the receiving side of its outbound queue.
    /// The receiver belongs to the connection's writer pump.
    pub fn new(remote: impl Into<String>) -> (Self, mpsc::Receiver<Message>) {
        Self::with_capacity(remote, OUTBOUND_CAPACITY)
    }

    pub fn with_capacity(
        remote: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Message>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let link = Self {
            id: format!("client-{}", Uuid::new_v4()),
            remote: remote.into(),
            sender,
        };
        (link, receiver)
    }
}
