pub mod algorithms;
pub mod config;
pub mod error;
pub mod network;
pub mod protocol;
pub mod router;

pub use config::{Algorithm, SimulationConfig};
pub use network::{Network, Packet, PacketKind};
pub use protocol::{Outbox, RoutingProtocol, Transport};
pub use router::Router;

/// Textual router address, as carried in packets and update payloads.
pub type RouterId = String;

/// Local handle of one link on one router.
pub type PortId = u32;

pub type Cost = u64;
