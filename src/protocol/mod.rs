pub mod codec;
pub mod distance_vector;
pub mod forwarding_table;
pub mod link_state;

pub use distance_vector::*;
pub use forwarding_table::*;
pub use link_state::*;

use log::debug;
use crate::network::{Packet, PacketKind};
use crate::{Cost, PortId};

/// Outgoing side of the harness. Sends are fire-and-forget.
pub trait Transport {
    fn send(&mut self, port: PortId, packet: Packet);
}

/// Transport that just records what was sent, in order.
pub type Outbox = Vec<(PortId, Packet)>;

impl Transport for Outbox {
    fn send(&mut self, port: PortId, packet: Packet) {
        self.push((port, packet));
    }
}

/// Event interface shared by the routing algorithms.
///
/// The harness calls one handler at a time and never re-enters the engine.
/// None of the handlers fail: malformed, stale or unroutable input is
/// dropped and leaves the engine untouched.
pub trait RoutingProtocol {
    fn address(&self) -> &str;

    fn handle_link_up(&mut self, port: PortId, neighbor: &str, cost: Cost, transport: &mut dyn Transport);

    fn handle_link_down(&mut self, port: PortId, transport: &mut dyn Transport);

    /// Processes a ROUTING packet received on `port`.
    fn handle_routing_packet(&mut self, port: PortId, packet: &Packet, transport: &mut dyn Transport);

    /// `now_ms` never decreases between calls.
    fn handle_time(&mut self, now_ms: u64, transport: &mut dyn Transport);

    fn forwarding_table(&self) -> &ForwardingTable;

    fn handle_packet(&mut self, port: PortId, packet: Packet, transport: &mut dyn Transport) {
        match packet.kind {
            PacketKind::Routing => self.handle_routing_packet(port, &packet, transport),
            PacketKind::Traceroute => self.forward(packet, transport),
        }
    }

    /// Hands a data packet to the port toward its destination, or drops it
    /// when the destination is unknown.
    fn forward(&self, packet: Packet, transport: &mut dyn Transport) {
        match self.forwarding_table().lookup(&packet.dst) {
            Some(port) => transport.send(port, packet),
            None => debug!("{}: no route to {}, dropping", self.address(), packet.dst),
        }
    }
}
