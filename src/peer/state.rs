//! Peer link lifecycle state
//!
//! `LinkState` is the closed set of states a `PeerLink` moves through:
//!
//! ```text
//! standby -> connecting -> active -> disconnecting/down -> retrying -> connecting -> active ...
//! ```
//!
//! `PeerStatus` is the mutable record the link's tasks update; it is only
//! read back through `PeerSnapshot` for introspection.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// Created, never dialled.
    Standby,
    /// A dial attempt is in flight.
    Connecting,
    /// Connected, both pumps running.
    Active,
    /// The reader hit an error or its deadline.
    Disconnecting,
    /// The writer has exited; the connection is gone.
    Down,
    /// Waiting between dial attempts.
    Retrying,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Standby => "standby",
            LinkState::Connecting => "connecting",
            LinkState::Active => "active",
            LinkState::Disconnecting => "disconnecting",
            LinkState::Down => "down",
            LinkState::Retrying => "retrying",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of one peer link, keyed by peer name in
/// `RouterHandle::peer_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PeerSnapshot {
    pub router: String,
    pub connection: String,
    pub filters: Vec<String>,
    pub state: LinkState,
    pub last_ping_time: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub(crate) struct PeerStatus {
    pub state: LinkState,
    /// `"<local> => <remote>"` of the current connection, if any.
    pub connection: Option<String>,
    pub last_ping: Option<DateTime<Utc>>,
}

/// Shared handle to a link's status. The lock is never held across an await.
#[derive(Debug, Clone)]
pub(crate) struct SharedStatus(Arc<Mutex<PeerStatus>>);

impl SharedStatus {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(PeerStatus {
            state: LinkState::Standby,
            connection: None,
            last_ping: None,
        })))
    }

    fn lock(&self) -> MutexGuard<'_, PeerStatus> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> LinkState {
        self.lock().state
    }

    pub fn set_state(&self, state: LinkState) {
        self.lock().state = state;
    }

    pub fn connected(&self, connection: String) {
        let mut status = self.lock();
        status.state = LinkState::Active;
        status.connection = Some(connection);
    }

    /// Leave `state`, forgetting the connection description.
    pub fn disconnected(&self, state: LinkState) {
        let mut status = self.lock();
        status.state = state;
        status.connection = None;
    }

    pub fn pinged(&self) {
        self.lock().last_ping = Some(Utc::now());
    }

    pub fn snapshot(&self, address: &str, filters: &BTreeSet<String>) -> PeerSnapshot {
        let status = self.lock();
        PeerSnapshot {
            router: address.to_string(),
            connection: status
                .connection
                .clone()
                .unwrap_or_else(|| format!("local => {address}")),
            filters: filters.iter().cloned().collect(),
            state: status.state,
            last_ping_time: status.last_ping,
        }
    }
}
