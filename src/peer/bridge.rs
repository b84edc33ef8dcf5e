//! Bridge
//!
//! Pairs one `PeerLink` with the router so a peer router looks, to the
//! dispatch loop, like one more source and sink of messages: its inbound
//! queue feeds the router's inbound queue, and the router writes routed
//! messages straight into its outbound queue.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::broker::{Message, RouterHandle};
use crate::config::LinkTiming;
use crate::peer::link::PeerLink;
use crate::peer::state::PeerSnapshot;
use crate::utils::Result;

#[derive(Debug)]
pub struct Bridge {
    link: PeerLink,
    router: RouterHandle,
}

impl Bridge {
    /// Build the peer link and dial it once. The bridge is returned whether
    /// or not that dial worked: a failed link retries on its own, and the
    /// dial result is only for the caller to log.
    pub async fn start(
        address: &str,
        filters: BTreeSet<String>,
        router: RouterHandle,
        timing: LinkTiming,
    ) -> (Arc<Bridge>, Result<()>) {
        let bridge = Arc::new(Bridge {
            link: PeerLink::new(address, filters, timing),
            router,
        });
        let connected = bridge.link.connect().await;
        (bridge, connected)
    }

    pub fn name(&self) -> &str {
        self.link.name()
    }

    pub fn link(&self) -> &PeerLink {
        &self.link
    }

    pub fn snapshot(&self) -> PeerSnapshot {
        self.link.snapshot()
    }

    /// Forward everything the peer sends into the router. Runs until the
    /// link or the router stops.
    pub async fn read_passthrough(&self) {
        while let Some(message) = self.link.read().await {
            if self.router.publish(message).await.is_err() {
                break;
            }
        }
        debug!(peer = %self.name(), "read passthrough stopped");
    }

    /// Queue a routed message for the peer. Waits while the peer's outbound
    /// queue is full.
    pub async fn write_passthrough(&self, message: Message) {
        self.link.write(message).await;
    }
}
