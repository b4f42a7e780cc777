use std::fmt;
use log::{debug, info, warn};
use crate::algorithms::dijkstra::calculate_shortest_paths;
use crate::network::{LinkTable, Packet, Topology, TopologyRecord};
use crate::protocol::codec;
use crate::protocol::{ForwardingEntry, ForwardingTable, RoutingProtocol, Transport};
use crate::{Cost, PortId, RouterId};

/// Flooded topology records with a shortest-path recomputation per change.
///
/// The router's own record lives in the topology database next to the
/// records learned from others, carrying the local sequence number.
#[derive(Debug)]
pub struct LinkStateEngine {
    address: RouterId,
    heartbeat_ms: u64,
    last_heartbeat: u64,
    sequence: u64,
    links: LinkTable,
    topology: Topology,
    forwarding: ForwardingTable,
}

impl LinkStateEngine {
    pub fn new(address: impl Into<RouterId>, heartbeat_ms: u64) -> Self {
        let address = address.into();
        let mut topology = Topology::new();
        topology.update(TopologyRecord {
            origin: address.clone(),
            sequence: 0,
            neighbors: Default::default(),
        });

        Self {
            address,
            heartbeat_ms,
            last_heartbeat: 0,
            sequence: 0,
            links: LinkTable::new(),
            topology,
            forwarding: ForwardingTable::new(),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn links(&self) -> &LinkTable {
        &self.links
    }

    /// Recomputes shortest paths and rebuilds the forwarding table from them.
    pub fn recompute(&mut self) {
        let paths = calculate_shortest_paths(&self.topology, &self.address);

        self.forwarding = paths
            .into_iter()
            .filter_map(|(destination, path)| {
                let port = self.links.port_to(&path.first_hop)?;
                Some((destination, ForwardingEntry { port, cost: path.cost }))
            })
            .collect();

        debug!("{}: forwarding table [{}]", self.address, self.forwarding);
    }

    /// Bumps the local sequence number and records the current neighbor
    /// costs as this router's own topology record.
    fn originate(&mut self) -> TopologyRecord {
        self.sequence += 1;
        let record = TopologyRecord {
            origin: self.address.clone(),
            sequence: self.sequence,
            neighbors: self.links.neighbor_costs(),
        };
        self.topology.update(record.clone());
        record
    }

    fn flood_own_record(&self, record: &TopologyRecord, transport: &mut dyn Transport) {
        let content = match codec::encode_topology_record(record) {
            Ok(content) => content,
            Err(e) => {
                warn!("{}: failed to encode topology record: {}", self.address, e);
                return;
            }
        };

        for link in self.links.best_links() {
            let packet = Packet::routing(self.address.clone(), link.neighbor.clone(), content.clone());
            transport.send(link.port, packet);
        }
    }

    fn on_local_change(&mut self, transport: &mut dyn Transport) {
        let record = self.originate();
        self.recompute();
        self.flood_own_record(&record, transport);
    }
}

impl RoutingProtocol for LinkStateEngine {
    fn address(&self) -> &str {
        &self.address
    }

    fn handle_link_up(&mut self, port: PortId, neighbor: &str, cost: Cost, transport: &mut dyn Transport) {
        info!("{}: link up on port {} to {} (cost {})", self.address, port, neighbor, cost);
        self.links.insert(port, neighbor.to_string(), cost);
        self.on_local_change(transport);
    }

    fn handle_link_down(&mut self, port: PortId, transport: &mut dyn Transport) {
        let Some(link) = self.links.remove(port) else {
            debug!("{}: link down on unknown port {}", self.address, port);
            return;
        };
        info!("{}: link down on port {} to {}", self.address, port, link.neighbor);
        self.on_local_change(transport);
    }

    fn handle_routing_packet(&mut self, port: PortId, packet: &Packet, transport: &mut dyn Transport) {
        let record = match codec::decode_topology_record(&packet.content) {
            Ok(record) => record,
            Err(e) => {
                debug!("{}: dropping update on port {}: {}", self.address, port, e);
                return;
            }
        };

        if record.origin == self.address {
            return;
        }

        let origin = record.origin.clone();
        let sequence = record.sequence;
        if !self.topology.update(record) {
            return;
        }
        debug!("{}: accepted record from {} (seq {})", self.address, origin, sequence);

        self.recompute();

        // The sender already has the record, on every port it shares with us.
        let from = self.links.neighbor_of(port).cloned();
        for link in self.links.best_links() {
            if from.as_ref() != Some(&link.neighbor) {
                transport.send(link.port, packet.clone());
            }
        }
    }

    fn handle_time(&mut self, now_ms: u64, transport: &mut dyn Transport) {
        if now_ms.saturating_sub(self.last_heartbeat) >= self.heartbeat_ms {
            self.last_heartbeat = now_ms;
            let record = self.originate();
            self.flood_own_record(&record, transport);
        }
    }

    fn forwarding_table(&self) -> &ForwardingTable {
        &self.forwarding
    }
}

impl fmt::Display for LinkStateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LSrouter(addr={}, seq={}, neighbors=[", self.address, self.sequence)?;
        let mut first = true;
        for link in self.links.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}({}, {})", link.neighbor, link.port, link.cost)?;
            first = false;
        }
        write!(f, "], forwarding=[{}])", self.forwarding)
    }
}
