use std::collections::{BTreeMap, BTreeSet};
use crate::{Cost, PortId, RouterId};

/// One active local connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub port: PortId,
    pub neighbor: RouterId,
    pub cost: Cost,
}

/// The router's currently active links, keyed by local port.
///
/// Only link-up and link-down events mutate it. Several ports may lead to
/// the same neighbor; lookups by neighbor pick the cheapest of them.
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    links: BTreeMap<PortId, Link>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a link, replacing whatever was on `port` before.
    pub fn insert(&mut self, port: PortId, neighbor: RouterId, cost: Cost) -> Option<Link> {
        self.links.insert(port, Link { port, neighbor, cost })
    }

    pub fn remove(&mut self, port: PortId) -> Option<Link> {
        self.links.remove(&port)
    }

    pub fn neighbor_of(&self, port: PortId) -> Option<&RouterId> {
        self.links.get(&port).map(|link| &link.neighbor)
    }

    /// Cheapest active link toward `neighbor`, lowest port on ties.
    pub fn best_link_to(&self, neighbor: &str) -> Option<&Link> {
        self.links
            .values()
            .filter(|link| link.neighbor == neighbor)
            .min_by_key(|link| (link.cost, link.port))
    }

    pub fn port_to(&self, neighbor: &str) -> Option<PortId> {
        self.best_link_to(neighbor).map(|link| link.port)
    }

    pub fn is_neighbor(&self, neighbor: &str) -> bool {
        self.links.values().any(|link| link.neighbor == neighbor)
    }

    /// Neighbor → cheapest direct cost, as advertised in a topology record.
    pub fn neighbor_costs(&self) -> BTreeMap<RouterId, Cost> {
        let mut costs: BTreeMap<RouterId, Cost> = BTreeMap::new();
        for link in self.links.values() {
            costs
                .entry(link.neighbor.clone())
                .and_modify(|cost| *cost = (*cost).min(link.cost))
                .or_insert(link.cost);
        }
        costs
    }

    /// One link per neighbor, the cheapest of its ports, in neighbor order.
    pub fn best_links(&self) -> impl Iterator<Item = &Link> {
        let neighbors: BTreeSet<&RouterId> = self.links.values().map(|link| &link.neighbor).collect();
        neighbors
            .into_iter()
            .filter_map(|neighbor| self.best_link_to(neighbor))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
