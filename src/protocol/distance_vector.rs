use std::collections::BTreeMap;
use std::fmt;
use log::{debug, info, warn};
use crate::network::{LinkTable, Packet};
use crate::protocol::codec::{self, DistanceVector};
use crate::protocol::{ForwardingEntry, ForwardingTable, RoutingProtocol, Transport};
use crate::{Cost, PortId, RouterId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceVectorEntry {
    pub cost: Cost,
    /// `None` only for the router itself.
    pub next_hop: Option<RouterId>,
}

/// Incremental Bellman-Ford over neighbor-advertised costs.
///
/// There is no split horizon or poison reverse, so a removed link can make
/// two routers bounce increasing costs for the lost destination between
/// each other. Setting a cost cap with [`with_infinity`] bounds that.
///
/// [`with_infinity`]: DistanceVectorEngine::with_infinity
#[derive(Debug)]
pub struct DistanceVectorEngine {
    address: RouterId,
    heartbeat_ms: u64,
    last_broadcast: u64,
    infinity: Option<Cost>,
    links: LinkTable,
    table: BTreeMap<RouterId, DistanceVectorEntry>,
    forwarding: ForwardingTable,
}

impl DistanceVectorEngine {
    pub fn new(address: impl Into<RouterId>, heartbeat_ms: u64) -> Self {
        let address = address.into();
        let mut table = BTreeMap::new();
        table.insert(
            address.clone(),
            DistanceVectorEntry {
                cost: 0,
                next_hop: None,
            },
        );

        Self {
            address,
            heartbeat_ms,
            last_broadcast: 0,
            infinity: None,
            links: LinkTable::new(),
            table,
            forwarding: ForwardingTable::new(),
        }
    }

    /// Treats advertised costs at or above `infinity` as unreachable, and
    /// lets the next hop withdraw a route by leaving it out of its vector.
    pub fn with_infinity(mut self, infinity: Option<Cost>) -> Self {
        self.infinity = infinity;
        self
    }

    pub fn table(&self) -> &BTreeMap<RouterId, DistanceVectorEntry> {
        &self.table
    }

    pub fn entry(&self, destination: &str) -> Option<&DistanceVectorEntry> {
        self.table.get(destination)
    }

    pub fn links(&self) -> &LinkTable {
        &self.links
    }

    /// The vector advertised to neighbors, self included at cost 0.
    pub fn vector(&self) -> DistanceVector {
        self.table
            .iter()
            .map(|(destination, entry)| (destination.clone(), entry.cost))
            .collect()
    }

    fn broadcast(&self, transport: &mut dyn Transport) {
        let content = match codec::encode_distance_vector(&self.vector()) {
            Ok(content) => content,
            Err(e) => {
                warn!("{}: failed to encode distance vector: {}", self.address, e);
                return;
            }
        };

        for link in self.links.best_links() {
            let packet = Packet::routing(self.address.clone(), link.neighbor.clone(), content.clone());
            transport.send(link.port, packet);
        }
        debug!("{}: advertised {} destinations", self.address, self.table.len());
    }

    fn rebuild_forwarding_table(&mut self) {
        self.forwarding = self
            .table
            .iter()
            .filter_map(|(destination, entry)| {
                let next_hop = entry.next_hop.as_ref()?;
                let port = self.links.port_to(next_hop)?;
                Some((destination.clone(), ForwardingEntry { port, cost: entry.cost }))
            })
            .collect();
    }

    /// Applies one advertised `(destination, cost)` from `neighbor`.
    /// Returns whether the table changed.
    fn relax(&mut self, destination: &str, candidate: Cost, neighbor: &str) -> bool {
        let via_neighbor = |entry: &DistanceVectorEntry| entry.next_hop.as_deref() == Some(neighbor);

        if self.infinity.is_some_and(|infinity| candidate >= infinity) {
            if self.table.get(destination).is_some_and(via_neighbor) {
                debug!("{}: {} unreachable via {}", self.address, destination, neighbor);
                self.table.remove(destination);
                return true;
            }
            return false;
        }

        let install = match self.table.get(destination) {
            None => true,
            Some(entry) => candidate < entry.cost || (via_neighbor(entry) && candidate != entry.cost),
        };

        if install {
            debug!("{}: route to {} cost {} via {}", self.address, destination, candidate, neighbor);
            self.table.insert(
                destination.to_string(),
                DistanceVectorEntry {
                    cost: candidate,
                    next_hop: Some(neighbor.to_string()),
                },
            );
        }
        install
    }

    /// Shifts every route through `neighbor` from its old cheapest link cost
    /// to the new one. Returns whether anything changed.
    fn reprice_routes_via(&mut self, neighbor: &str, old: Cost, new: Cost) -> bool {
        if old == new {
            return false;
        }

        let mut changed = false;
        for entry in self.table.values_mut() {
            if entry.next_hop.as_deref() == Some(neighbor) {
                entry.cost = entry.cost.saturating_sub(old).saturating_add(new);
                changed = true;
            }
        }
        if changed {
            debug!("{}: routes via {} repriced from {} to {}", self.address, neighbor, old, new);
        }
        changed
    }

    fn best_cost_to(&self, neighbor: &str) -> Option<Cost> {
        self.links.best_link_to(neighbor).map(|link| link.cost)
    }

    /// Drops routes through `neighbor` to destinations its full vector no
    /// longer lists. Only used with a cost cap.
    fn withdraw_omitted(&mut self, vector: &DistanceVector, neighbor: &str) -> bool {
        let before = self.table.len();
        self.table.retain(|destination, entry| {
            entry.next_hop.as_deref() != Some(neighbor) || vector.contains_key(destination)
        });
        before != self.table.len()
    }
}

impl RoutingProtocol for DistanceVectorEngine {
    fn address(&self) -> &str {
        &self.address
    }

    fn handle_link_up(&mut self, port: PortId, neighbor: &str, cost: Cost, transport: &mut dyn Transport) {
        info!("{}: link up on port {} to {} (cost {})", self.address, port, neighbor, cost);
        let old_best = self.best_cost_to(neighbor);
        self.links.insert(port, neighbor.to_string(), cost);
        let best = self.best_cost_to(neighbor).unwrap_or(cost);

        let mut changed = match old_best {
            Some(old) => self.reprice_routes_via(neighbor, old, best),
            None => false,
        };

        if neighbor != self.address && self.table.get(neighbor).is_none_or(|entry| best < entry.cost) {
            self.table.insert(
                neighbor.to_string(),
                DistanceVectorEntry {
                    cost: best,
                    next_hop: Some(neighbor.to_string()),
                },
            );
            changed = true;
        }

        self.rebuild_forwarding_table();
        if changed {
            self.broadcast(transport);
        }
    }

    fn handle_link_down(&mut self, port: PortId, transport: &mut dyn Transport) {
        let Some(old_best) = self.links.neighbor_of(port).and_then(|neighbor| self.best_cost_to(neighbor)) else {
            debug!("{}: link down on unknown port {}", self.address, port);
            return;
        };
        let Some(link) = self.links.remove(port) else {
            return;
        };
        info!("{}: link down on port {} to {}", self.address, port, link.neighbor);

        let changed = match self.best_cost_to(&link.neighbor) {
            Some(best) => self.reprice_routes_via(&link.neighbor, old_best, best),
            None => {
                let before = self.table.len();
                self.table
                    .retain(|_, entry| entry.next_hop.as_deref() != Some(link.neighbor.as_str()));
                self.table.len() != before
            }
        };

        self.rebuild_forwarding_table();
        if changed {
            self.broadcast(transport);
        }
    }

    fn handle_routing_packet(&mut self, port: PortId, packet: &Packet, transport: &mut dyn Transport) {
        let Some(neighbor) = self.links.neighbor_of(port).cloned() else {
            debug!("{}: update on unknown port {}, dropping", self.address, port);
            return;
        };
        // Traffic to the neighbor leaves on its cheapest port, whichever port
        // this copy of the vector came in on.
        let Some(link_cost) = self.best_cost_to(&neighbor) else {
            return;
        };

        let vector = match codec::decode_distance_vector(&packet.content) {
            Ok(vector) => vector,
            Err(e) => {
                debug!("{}: dropping update from {}: {}", self.address, neighbor, e);
                return;
            }
        };

        let mut changed = false;
        for (destination, cost) in &vector {
            if *destination == self.address {
                continue;
            }
            changed |= self.relax(destination, cost.saturating_add(link_cost), &neighbor);
        }

        if self.infinity.is_some() {
            changed |= self.withdraw_omitted(&vector, &neighbor);
        }

        if changed {
            self.rebuild_forwarding_table();
            self.broadcast(transport);
        }
    }

    fn handle_time(&mut self, now_ms: u64, transport: &mut dyn Transport) {
        if now_ms.saturating_sub(self.last_broadcast) >= self.heartbeat_ms {
            self.broadcast(transport);
            self.last_broadcast = now_ms;
        }
    }

    fn forwarding_table(&self) -> &ForwardingTable {
        &self.forwarding
    }
}

impl fmt::Display for DistanceVectorEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DVrouter(addr={}, dv=[", self.address)?;
        let mut first = true;
        for (destination, entry) in &self.table {
            if !first {
                write!(f, ", ")?;
            }
            match &entry.next_hop {
                Some(next_hop) => write!(f, "{}:{} via {}", destination, entry.cost, next_hop)?,
                None => write!(f, "{}:{}", destination, entry.cost)?,
            }
            first = false;
        }
        write!(f, "], forwarding=[{}])", self.forwarding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Outbox;

    fn advert(src: &str, dst: &str, vector: &[(&str, Cost)]) -> Packet {
        let vector: DistanceVector = vector.iter().map(|(d, c)| (d.to_string(), *c)).collect();
        Packet::routing(src, dst, codec::encode_distance_vector(&vector).unwrap())
    }

    #[test]
    fn test_self_entry_at_construction() {
        let engine = DistanceVectorEngine::new("A", 1000);
        assert_eq!(engine.entry("A"), Some(&DistanceVectorEntry { cost: 0, next_hop: None }));
        assert!(engine.forwarding_table().is_empty());
    }

    #[test]
    fn test_link_up_installs_direct_route_and_broadcasts() {
        let mut engine = DistanceVectorEngine::new("A", 1000);
        let mut outbox = Outbox::new();

        engine.handle_link_up(1, "B", 5, &mut outbox);

        assert_eq!(engine.entry("B").map(|e| e.cost), Some(5));
        assert_eq!(engine.forwarding_table().lookup("B"), Some(1));
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].0, 1);
        assert_eq!(outbox[0].1.dst, "B");

        let sent = codec::decode_distance_vector(&outbox[0].1.content).unwrap();
        assert_eq!(sent.get("A"), Some(&0));
        assert_eq!(sent.get("B"), Some(&5));
    }

    #[test]
    fn test_relaxation_through_neighbor() {
        let mut engine = DistanceVectorEngine::new("A", 1000);
        let mut outbox = Outbox::new();
        engine.handle_link_up(1, "B", 5, &mut outbox);
        outbox.clear();

        engine.handle_packet(1, advert("B", "A", &[("B", 0), ("C", 2)]), &mut outbox);

        assert_eq!(
            engine.entry("C"),
            Some(&DistanceVectorEntry { cost: 7, next_hop: Some("B".to_string()) })
        );
        assert_eq!(engine.forwarding_table().lookup("C"), Some(1));
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn test_worse_route_from_other_neighbor_is_ignored() {
        let mut engine = DistanceVectorEngine::new("A", 1000);
        let mut outbox = Outbox::new();
        engine.handle_link_up(1, "B", 1, &mut outbox);
        engine.handle_link_up(2, "C", 1, &mut outbox);
        engine.handle_packet(1, advert("B", "A", &[("D", 1)]), &mut outbox);
        outbox.clear();

        engine.handle_packet(2, advert("C", "A", &[("D", 5)]), &mut outbox);

        assert_eq!(engine.entry("D").and_then(|e| e.next_hop.clone()), Some("B".to_string()));
        assert_eq!(engine.entry("D").map(|e| e.cost), Some(2));
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_cost_increase_from_current_next_hop_propagates() {
        let mut engine = DistanceVectorEngine::new("A", 1000);
        let mut outbox = Outbox::new();
        engine.handle_link_up(1, "B", 1, &mut outbox);
        engine.handle_packet(1, advert("B", "A", &[("C", 1)]), &mut outbox);
        assert_eq!(engine.entry("C").map(|e| e.cost), Some(2));

        engine.handle_packet(1, advert("B", "A", &[("C", 10)]), &mut outbox);
        assert_eq!(engine.entry("C").map(|e| e.cost), Some(11));
    }

    #[test]
    fn test_advertised_route_to_self_is_skipped() {
        let mut engine = DistanceVectorEngine::new("A", 1000);
        let mut outbox = Outbox::new();
        engine.handle_link_up(1, "B", 1, &mut outbox);

        engine.handle_packet(1, advert("B", "A", &[("A", 1)]), &mut outbox);
        assert_eq!(engine.entry("A"), Some(&DistanceVectorEntry { cost: 0, next_hop: None }));
    }

    #[test]
    fn test_link_down_purges_routes_through_neighbor() {
        let mut engine = DistanceVectorEngine::new("A", 1000);
        let mut outbox = Outbox::new();
        engine.handle_link_up(1, "B", 1, &mut outbox);
        engine.handle_link_up(2, "C", 1, &mut outbox);
        engine.handle_packet(1, advert("B", "A", &[("D", 1)]), &mut outbox);
        outbox.clear();

        engine.handle_link_down(1, &mut outbox);

        assert!(engine.entry("B").is_none());
        assert!(engine.entry("D").is_none());
        assert!(engine.entry("C").is_some());
        assert!(engine.forwarding_table().lookup("D").is_none());
        // Only the remaining link hears about it
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].0, 2);
    }

    #[test]
    fn test_parallel_links_price_routes_by_cheapest_port() {
        let mut engine = DistanceVectorEngine::new("A", 1000);
        let mut outbox = Outbox::new();
        engine.handle_link_up(1, "B", 1, &mut outbox);
        engine.handle_link_up(2, "B", 10, &mut outbox);

        // B sends the same vector on both of its links.
        engine.handle_packet(1, advert("B", "A", &[("B", 0), ("C", 1)]), &mut outbox);
        engine.handle_packet(2, advert("B", "A", &[("B", 0), ("C", 1)]), &mut outbox);

        assert_eq!(engine.entry("B").map(|e| e.cost), Some(1));
        assert_eq!(engine.entry("C").map(|e| e.cost), Some(2));
        assert_eq!(
            engine.forwarding_table().get("C").copied(),
            Some(ForwardingEntry { port: 1, cost: 2 })
        );
    }

    #[test]
    fn test_parallel_links_broadcast_once_per_neighbor() {
        let mut engine = DistanceVectorEngine::new("A", 100);
        let mut outbox = Outbox::new();
        engine.handle_link_up(1, "B", 4, &mut outbox);
        engine.handle_link_up(2, "B", 3, &mut outbox);
        engine.handle_link_up(3, "C", 1, &mut outbox);
        outbox.clear();

        engine.handle_time(100, &mut outbox);

        let ports: Vec<PortId> = outbox.iter().map(|(port, _)| *port).collect();
        assert_eq!(ports, vec![2, 3]);
    }

    #[test]
    fn test_cheaper_parallel_link_reprices_routes() {
        let mut engine = DistanceVectorEngine::new("A", 1000);
        let mut outbox = Outbox::new();
        engine.handle_link_up(1, "B", 10, &mut outbox);
        engine.handle_packet(1, advert("B", "A", &[("B", 0), ("C", 1)]), &mut outbox);
        assert_eq!(engine.entry("C").map(|e| e.cost), Some(11));
        outbox.clear();

        engine.handle_link_up(2, "B", 1, &mut outbox);

        assert_eq!(engine.entry("B").map(|e| e.cost), Some(1));
        assert_eq!(engine.entry("C").map(|e| e.cost), Some(2));
        assert_eq!(engine.forwarding_table().lookup("C"), Some(2));
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn test_losing_cheaper_parallel_link_reprices_routes() {
        let mut engine = DistanceVectorEngine::new("A", 1000);
        let mut outbox = Outbox::new();
        engine.handle_link_up(1, "B", 1, &mut outbox);
        engine.handle_link_up(2, "B", 10, &mut outbox);
        engine.handle_packet(1, advert("B", "A", &[("B", 0), ("C", 1)]), &mut outbox);
        outbox.clear();

        engine.handle_link_down(1, &mut outbox);

        assert_eq!(engine.entry("B").map(|e| e.cost), Some(10));
        assert_eq!(engine.entry("C").map(|e| e.cost), Some(11));
        assert_eq!(
            engine.forwarding_table().get("C").copied(),
            Some(ForwardingEntry { port: 2, cost: 11 })
        );
        assert_eq!(outbox.len(), 1);

        // Dropping the costlier of two links changes nothing.
        engine.handle_link_up(3, "B", 20, &mut outbox);
        outbox.clear();
        engine.handle_link_down(3, &mut outbox);
        assert_eq!(engine.entry("C").map(|e| e.cost), Some(11));
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_link_down_unknown_port_is_noop() {
        let mut engine = DistanceVectorEngine::new("A", 1000);
        let mut outbox = Outbox::new();
        engine.handle_link_down(9, &mut outbox);
        assert!(outbox.is_empty());
        assert_eq!(engine.table().len(), 1);
    }

    #[test]
    fn test_malformed_update_leaves_state_unchanged() {
        let mut engine = DistanceVectorEngine::new("A", 1000);
        let mut outbox = Outbox::new();
        engine.handle_link_up(1, "B", 1, &mut outbox);
        engine.handle_packet(1, advert("B", "A", &[("C", 1)]), &mut outbox);
        outbox.clear();

        let table = engine.table().clone();
        let forwarding = engine.forwarding_table().clone();

        for content in ["", "{", "[1,2]", r#"{"C":"x"}"#, r#"{"C":-3}"#] {
            engine.handle_packet(1, Packet::routing("B", "A", content.to_string()), &mut outbox);
        }

        assert_eq!(engine.table(), &table);
        assert_eq!(engine.forwarding_table(), &forwarding);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_update_on_unknown_port_is_dropped() {
        let mut engine = DistanceVectorEngine::new("A", 1000);
        let mut outbox = Outbox::new();
        engine.handle_packet(3, advert("B", "A", &[("C", 1)]), &mut outbox);
        assert!(engine.entry("C").is_none());
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_heartbeat_cadence() {
        let mut engine = DistanceVectorEngine::new("A", 100);
        let mut outbox = Outbox::new();
        engine.handle_link_up(1, "B", 1, &mut outbox);
        outbox.clear();

        for now in (0..=1000).step_by(10) {
            engine.handle_time(now, &mut outbox);
        }

        assert_eq!(outbox.len(), 10);
    }

    #[test]
    fn test_infinity_cap_withdraws_route() {
        let mut engine = DistanceVectorEngine::new("A", 1000).with_infinity(Some(16));
        let mut outbox = Outbox::new();
        engine.handle_link_up(1, "B", 1, &mut outbox);
        engine.handle_packet(1, advert("B", "A", &[("B", 0), ("C", 3)]), &mut outbox);
        assert!(engine.entry("C").is_some());

        engine.handle_packet(1, advert("B", "A", &[("B", 0), ("C", 15)]), &mut outbox);
        assert!(engine.entry("C").is_none());

        engine.handle_packet(1, advert("B", "A", &[("B", 0), ("D", 20)]), &mut outbox);
        assert!(engine.entry("D").is_none());
        assert!(engine.entry("B").is_some());
    }

    #[test]
    fn test_capped_mode_withdraws_omitted_destinations() {
        let mut engine = DistanceVectorEngine::new("A", 1000).with_infinity(Some(16));
        let mut outbox = Outbox::new();
        engine.handle_link_up(1, "B", 1, &mut outbox);
        engine.handle_link_up(2, "C", 1, &mut outbox);
        engine.handle_packet(1, advert("B", "A", &[("B", 0), ("D", 1)]), &mut outbox);
        engine.handle_packet(2, advert("C", "A", &[("C", 0), ("E", 1)]), &mut outbox);

        engine.handle_packet(1, advert("B", "A", &[("B", 0)]), &mut outbox);

        assert!(engine.entry("D").is_none());
        assert!(engine.entry("E").is_some());
        assert!(engine.entry("B").is_some());
    }

    #[test]
    fn test_uncapped_mode_keeps_omitted_destinations() {
        let mut engine = DistanceVectorEngine::new("A", 1000);
        let mut outbox = Outbox::new();
        engine.handle_link_up(1, "B", 1, &mut outbox);
        engine.handle_packet(1, advert("B", "A", &[("B", 0), ("D", 1)]), &mut outbox);

        engine.handle_packet(1, advert("B", "A", &[("B", 0)]), &mut outbox);

        assert_eq!(engine.entry("D").map(|e| e.cost), Some(2));
    }

    #[test]
    fn test_traceroute_forwarding() {
        let mut engine = DistanceVectorEngine::new("A", 1000);
        let mut outbox = Outbox::new();
        engine.handle_link_up(4, "B", 1, &mut outbox);
        outbox.clear();

        engine.handle_packet(0, Packet::traceroute("S", "B"), &mut outbox);
        engine.handle_packet(0, Packet::traceroute("S", "Q"), &mut outbox);

        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].0, 4);
        assert!(outbox[0].1.is_traceroute());
    }
}
