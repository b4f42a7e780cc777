use serde::{Deserialize, Serialize};
use std::fmt;
use crate::RouterId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketKind {
    Routing,
    Traceroute,
}

/// A packet handed between routers by the transport.
///
/// `content` is opaque to everything but the engine that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub kind: PacketKind,
    pub src: RouterId,
    pub dst: RouterId,
    pub content: String,
}

impl Packet {
    pub fn routing(src: impl Into<RouterId>, dst: impl Into<RouterId>, content: String) -> Self {
        Self {
            kind: PacketKind::Routing,
            src: src.into(),
            dst: dst.into(),
            content,
        }
    }

    pub fn traceroute(src: impl Into<RouterId>, dst: impl Into<RouterId>) -> Self {
        Self {
            kind: PacketKind::Traceroute,
            src: src.into(),
            dst: dst.into(),
            content: String::new(),
        }
    }

    pub fn is_routing(&self) -> bool {
        self.kind == PacketKind::Routing
    }

    pub fn is_traceroute(&self) -> bool {
        self.kind == PacketKind::Traceroute
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            PacketKind::Routing => "ROUTING",
            PacketKind::Traceroute => "TRACEROUTE",
        };
        write!(f, "{} {} -> {}", kind, self.src, self.dst)
    }
}
