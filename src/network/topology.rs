use std::collections::BTreeMap;
use log::debug;
use crate::{Cost, RouterId};

/// The latest neighbor-cost map a router has flooded about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyRecord {
    pub origin: RouterId,
    pub sequence: u64,
    pub neighbors: BTreeMap<RouterId, Cost>,
}

/// Every topology record this router has heard of, one per origin.
///
/// Records only ever move forward: a record for an origin is replaced by a
/// strictly greater sequence number, never by an equal or older one.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    records: BTreeMap<RouterId, TopologyRecord>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` if it is newer than what is known for its origin.
    /// Returns whether it was stored.
    pub fn update(&mut self, record: TopologyRecord) -> bool {
        if let Some(current) = self.records.get(&record.origin) {
            if record.sequence <= current.sequence {
                debug!(
                    "Stale record from {} (seq {} <= {})",
                    record.origin, record.sequence, current.sequence
                );
                return false;
            }
        }

        self.records.insert(record.origin.clone(), record);
        true
    }

    pub fn get(&self, origin: &str) -> Option<&TopologyRecord> {
        self.records.get(origin)
    }

    pub fn sequence_of(&self, origin: &str) -> Option<u64> {
        self.records.get(origin).map(|record| record.sequence)
    }

    /// Advertised neighbors of `router`, in address order.
    pub fn get_neighbors(&self, router: &str) -> impl Iterator<Item = (&RouterId, Cost)> {
        self.records
            .get(router)
            .into_iter()
            .flat_map(|record| record.neighbors.iter().map(|(id, cost)| (id, *cost)))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
