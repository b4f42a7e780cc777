use std::fmt;
use crate::config::Algorithm;
use crate::network::Packet;
use crate::protocol::{DistanceVectorEngine, ForwardingTable, LinkStateEngine, RoutingProtocol, Transport};
use crate::{Cost, PortId};

/// A simulated router running exactly one routing strategy.
pub struct Router {
    algorithm: Option<Algorithm>,
    engine: Box<dyn RoutingEngine>,
}

/// What the router needs from its strategy: the event interface, plus a
/// printable view of the engine's state.
pub trait RoutingEngine: RoutingProtocol + fmt::Display {}

impl<T: RoutingProtocol + fmt::Display> RoutingEngine for T {}

impl Router {
    pub fn new(address: &str, algorithm: Algorithm, heartbeat_ms: u64) -> Self {
        Self::with_cost_cap(address, algorithm, heartbeat_ms, None)
    }

    /// Like [`Router::new`]; `infinity` only applies to distance vector.
    pub fn with_cost_cap(address: &str, algorithm: Algorithm, heartbeat_ms: u64, infinity: Option<Cost>) -> Self {
        let engine: Box<dyn RoutingEngine> = match algorithm {
            Algorithm::Dv => Box::new(DistanceVectorEngine::new(address, heartbeat_ms).with_infinity(infinity)),
            Algorithm::Ls => Box::new(LinkStateEngine::new(address, heartbeat_ms)),
        };

        Self {
            algorithm: Some(algorithm),
            engine,
        }
    }

    pub fn with_engine(engine: impl RoutingEngine + 'static) -> Self {
        Self {
            algorithm: None,
            engine: Box::new(engine),
        }
    }

    pub fn address(&self) -> &str {
        self.engine.address()
    }

    /// `None` for routers built around a custom engine.
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    pub fn forwarding_table(&self) -> &ForwardingTable {
        self.engine.forwarding_table()
    }

    pub fn handle_link_up(&mut self, port: PortId, neighbor: &str, cost: Cost, transport: &mut dyn Transport) {
        self.engine.handle_link_up(port, neighbor, cost, transport);
    }

    pub fn handle_link_down(&mut self, port: PortId, transport: &mut dyn Transport) {
        self.engine.handle_link_down(port, transport);
    }

    pub fn handle_packet(&mut self, port: PortId, packet: Packet, transport: &mut dyn Transport) {
        self.engine.handle_packet(port, packet, transport);
    }

    pub fn handle_time(&mut self, now_ms: u64, transport: &mut dyn Transport) {
        self.engine.handle_time(now_ms, transport);
    }

    /// Sends a locally originated data packet toward its destination.
    pub fn originate(&self, packet: Packet, transport: &mut dyn Transport) {
        self.engine.forward(packet, transport);
    }
}

impl fmt::Display for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.engine)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("address", &self.address())
            .field("algorithm", &self.algorithm)
            .finish()
    }
}
