use std::collections::{BTreeMap, BinaryHeap};
use std::cmp::Ordering;
use crate::{Cost, RouterId};
use crate::network::Topology;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortestPath {
    pub cost: Cost,
    /// Neighbor of the source on which the path leaves it.
    pub first_hop: RouterId,
}

#[derive(Debug, PartialEq, Eq)]
struct State {
    cost: Cost,
    router: RouterId,
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap, address breaks cost ties
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.router.cmp(&self.router))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest paths from `source` over the directed graph of all records in
/// `topology`.
///
/// Routers are expanded cheapest first, by address on equal cost, and a
/// path only replaces an earlier one when strictly cheaper, so the result
/// is the same for the same graph. The source itself and unreachable
/// routers are absent from the result.
pub fn calculate_shortest_paths(topology: &Topology, source: &str) -> BTreeMap<RouterId, ShortestPath> {
    let mut distances: BTreeMap<RouterId, Cost> = BTreeMap::new();
    let mut first_hops: BTreeMap<RouterId, RouterId> = BTreeMap::new();
    let mut heap = BinaryHeap::new();

    distances.insert(source.to_string(), 0);
    heap.push(State {
        cost: 0,
        router: source.to_string(),
    });

    while let Some(State { cost, router }) = heap.pop() {
        // Skip if we've already found a better path
        if cost > distances.get(&router).copied().unwrap_or(Cost::MAX) {
            continue;
        }

        for (neighbor, link_cost) in topology.get_neighbors(&router) {
            let new_cost = cost.saturating_add(link_cost);

            if new_cost < distances.get(neighbor).copied().unwrap_or(Cost::MAX) {
                let first_hop = if router == source {
                    neighbor.clone()
                } else {
                    match first_hops.get(&router) {
                        Some(hop) => hop.clone(),
                        None => continue,
                    }
                };

                distances.insert(neighbor.clone(), new_cost);
                first_hops.insert(neighbor.clone(), first_hop);
                heap.push(State {
                    cost: new_cost,
                    router: neighbor.clone(),
                });
            }
        }
    }

    first_hops
        .into_iter()
        .filter(|(destination, _)| destination != source)
        .filter_map(|(destination, first_hop)| {
            let cost = *distances.get(&destination)?;
            Some((destination, ShortestPath { cost, first_hop }))
        })
        .collect()
}
