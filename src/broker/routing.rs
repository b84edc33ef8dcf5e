//! Routing table
//!
//! Maps an inbound topic to the ordered list of topics it is re-emitted
//! under. Built once from configuration and shared read-only (`Arc`) for the
//! lifetime of the router. A missing key is not an error: it means nobody
//! is interested in that topic.

use std::collections::{BTreeSet, HashMap};

pub type Topic = String;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    routes: HashMap<Topic, Vec<Topic>>,
}

impl RoutingTable {
    pub fn new(routes: HashMap<Topic, Vec<Topic>>) -> Self {
        Self { routes }
    }

    /// Output topics for `topic`, in configured order.
    pub fn lookup(&self, topic: &str) -> Option<&[Topic]> {
        self.routes.get(topic).map(Vec::as_slice)
    }

    /// Every topic that has a route. Peers are asked only for these.
    pub fn topics(&self) -> BTreeSet<Topic> {
        self.routes.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<K, V, T> FromIterator<(K, V)> for RoutingTable
where
    K: Into<Topic>,
    V: IntoIterator<Item = T>,
    T: Into<Topic>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let routes = iter
            .into_iter()
            .map(|(from, to)| (from.into(), to.into_iter().map(Into::into).collect()))
            .collect();
        Self { routes }
    }
}
