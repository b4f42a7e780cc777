//! Discrete-event harness that wires routers together.
//!
//! Plays the part of the transport and the clock: it hands link changes,
//! packets and timer ticks to each router one at a time, and carries what
//! the routers send across the links after their latency.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use anyhow::{Result, bail};
use log::{debug, info, warn};
use crate::config::{LinkChange, SimulationConfig};
use crate::network::Packet;
use crate::protocol::Outbox;
use crate::router::Router;
use crate::{Cost, PortId, RouterId};

/// Traceroute probes are discarded after visiting this many routers.
pub const MAX_HOPS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub src: RouterId,
    pub dst: RouterId,
    pub started_ms: u64,
    /// Routers the probe has visited, source first.
    pub path: Vec<RouterId>,
    pub arrived: bool,
}

#[derive(Debug, Clone)]
struct Attachment {
    peer: RouterId,
    peer_port: PortId,
    latency_ms: u64,
}

#[derive(Debug)]
enum Event {
    Deliver {
        router: RouterId,
        port: PortId,
        packet: Packet,
    },
    Change(LinkChange),
    Traceroute {
        src: RouterId,
        dst: RouterId,
    },
}

#[derive(Debug)]
struct Scheduled {
    at_ms: u64,
    order: u64,
    event: Event,
}

impl Eq for Scheduled {}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.at_ms == other.at_ms && self.order == other.order
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap, insertion order breaks time ties
        other
            .at_ms
            .cmp(&self.at_ms)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct Network {
    now_ms: u64,
    tick_ms: u64,
    next_tick_ms: u64,
    routers: BTreeMap<RouterId, Router>,
    next_port: HashMap<RouterId, PortId>,
    /// Both ends of every live link, keyed by (router, local port).
    attachments: HashMap<(RouterId, PortId), Attachment>,
    queue: BinaryHeap<Scheduled>,
    order: u64,
    routing_sent: HashMap<RouterId, u64>,
    traces: Vec<Trace>,
}

impl Network {
    pub fn new(tick_ms: u64) -> Self {
        Self {
            now_ms: 0,
            tick_ms: tick_ms.max(1),
            next_tick_ms: 0,
            routers: BTreeMap::new(),
            next_port: HashMap::new(),
            attachments: HashMap::new(),
            queue: BinaryHeap::new(),
            order: 0,
            routing_sent: HashMap::new(),
            traces: Vec::new(),
        }
    }

    /// Builds the network described by `config`: routers and initial links
    /// are in place at time 0, timed changes and probes are queued.
    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        config.validate()?;
        let mut network = Self::new(config.tick_ms);

        for address in &config.routers {
            network.add_router(Router::with_cost_cap(
                address,
                config.algorithm,
                config.heartbeat_ms,
                config.infinity,
            ))?;
        }

        for link in &config.links {
            network.add_link(&link.a, &link.b, link.cost, link.latency_ms)?;
        }

        for change in &config.changes {
            network.schedule(change.at_ms(), Event::Change(change.clone()));
        }

        for probe in &config.traceroutes {
            network.schedule(
                probe.at_ms,
                Event::Traceroute {
                    src: probe.src.clone(),
                    dst: probe.dst.clone(),
                },
            );
        }

        Ok(network)
    }

    pub fn now(&self) -> u64 {
        self.now_ms
    }

    pub fn add_router(&mut self, router: Router) -> Result<()> {
        let address = router.address().to_string();
        if self.routers.contains_key(&address) {
            bail!("router {} already exists", address);
        }
        self.routers.insert(address, router);
        Ok(())
    }

    pub fn router(&self, address: &str) -> Option<&Router> {
        self.routers.get(address)
    }

    pub fn routers(&self) -> impl Iterator<Item = &Router> {
        self.routers.values()
    }

    /// Connects `a` and `b` now, allocating a fresh port on each side.
    pub fn add_link(&mut self, a: &str, b: &str, cost: Cost, latency_ms: u64) -> Result<()> {
        for router in [a, b] {
            if !self.routers.contains_key(router) {
                bail!("unknown router {}", router);
            }
        }
        if a == b {
            bail!("{} cannot be linked to itself", a);
        }
        if self.port_between(a, b).is_some() {
            bail!("{} and {} are already linked", a, b);
        }

        let port_a = self.allocate_port(a);
        let port_b = self.allocate_port(b);
        self.attachments.insert(
            (a.to_string(), port_a),
            Attachment {
                peer: b.to_string(),
                peer_port: port_b,
                latency_ms,
            },
        );
        self.attachments.insert(
            (b.to_string(), port_b),
            Attachment {
                peer: a.to_string(),
                peer_port: port_a,
                latency_ms,
            },
        );
        info!("t={} link {}:{} <-> {}:{} up (cost {})", self.now_ms, a, port_a, b, port_b, cost);

        self.with_router(a, |router, outbox| router.handle_link_up(port_a, b, cost, outbox));
        self.with_router(b, |router, outbox| router.handle_link_up(port_b, a, cost, outbox));
        Ok(())
    }

    /// Disconnects `a` and `b` now. Packets still on the wire are lost.
    pub fn remove_link(&mut self, a: &str, b: &str) -> Result<()> {
        let Some(port_a) = self.port_between(a, b) else {
            bail!("no link between {} and {}", a, b);
        };
        let Some(attachment) = self.attachments.remove(&(a.to_string(), port_a)) else {
            bail!("no link between {} and {}", a, b);
        };
        let port_b = attachment.peer_port;
        self.attachments.remove(&(b.to_string(), port_b));
        info!("t={} link {}:{} <-> {}:{} down", self.now_ms, a, port_a, b, port_b);

        self.with_router(a, |router, outbox| router.handle_link_down(port_a, outbox));
        self.with_router(b, |router, outbox| router.handle_link_down(port_b, outbox));
        Ok(())
    }

    pub fn schedule_change(&mut self, change: LinkChange) {
        self.schedule(change.at_ms(), Event::Change(change));
    }

    /// Sends a probe from `src` toward `dst` now; returns its trace id.
    pub fn traceroute(&mut self, src: &str, dst: &str) -> Result<usize> {
        if !self.routers.contains_key(src) {
            bail!("unknown router {}", src);
        }

        let id = self.traces.len();
        self.traces.push(Trace {
            src: src.to_string(),
            dst: dst.to_string(),
            started_ms: self.now_ms,
            path: vec![src.to_string()],
            arrived: src == dst,
        });

        if src != dst {
            let mut packet = Packet::traceroute(src, dst);
            packet.content = id.to_string();
            self.with_router(src, |router, outbox| router.originate(packet, outbox));
        }
        Ok(id)
    }

    pub fn trace(&self, id: usize) -> Option<&Trace> {
        self.traces.get(id)
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    /// Routing packets `address` has put on the wire so far.
    pub fn routing_packets_sent(&self, address: &str) -> u64 {
        self.routing_sent.get(address).copied().unwrap_or(0)
    }

    /// Runs every event and timer tick up to and including `time_ms`.
    pub fn advance_to(&mut self, time_ms: u64) {
        loop {
            let next_event = self.queue.peek().map(|scheduled| scheduled.at_ms);
            match next_event {
                Some(at_ms) if at_ms <= self.next_tick_ms && at_ms <= time_ms => {
                    if let Some(scheduled) = self.queue.pop() {
                        self.now_ms = self.now_ms.max(scheduled.at_ms);
                        self.process(scheduled.event);
                    }
                }
                _ if self.next_tick_ms <= time_ms => {
                    self.now_ms = self.next_tick_ms;
                    self.tick();
                    self.next_tick_ms += self.tick_ms;
                }
                _ => break,
            }
        }
        self.now_ms = self.now_ms.max(time_ms);
    }

    pub fn advance_by(&mut self, duration_ms: u64) {
        self.advance_to(self.now_ms + duration_ms);
    }

    fn tick(&mut self) {
        let now_ms = self.now_ms;
        let addresses: Vec<RouterId> = self.routers.keys().cloned().collect();
        for address in addresses {
            self.with_router(&address, |router, outbox| router.handle_time(now_ms, outbox));
        }
    }

    fn process(&mut self, event: Event) {
        match event {
            Event::Deliver { router, port, packet } => self.deliver(router, port, packet),
            Event::Change(LinkChange::Up { a, b, cost, latency_ms, .. }) => {
                if let Err(e) = self.add_link(&a, &b, cost, latency_ms) {
                    warn!("t={} cannot add link: {}", self.now_ms, e);
                }
            }
            Event::Change(LinkChange::Down { a, b, .. }) => {
                if let Err(e) = self.remove_link(&a, &b) {
                    warn!("t={} cannot remove link: {}", self.now_ms, e);
                }
            }
            Event::Traceroute { src, dst } => {
                if let Err(e) = self.traceroute(&src, &dst) {
                    warn!("t={} cannot start traceroute: {}", self.now_ms, e);
                }
            }
        }
    }

    fn deliver(&mut self, address: RouterId, port: PortId, packet: Packet) {
        if !self.attachments.contains_key(&(address.clone(), port)) {
            debug!("t={} {} lost: link {}:{} is gone", self.now_ms, packet, address, port);
            return;
        }

        if packet.is_traceroute() {
            let Some(trace) = packet
                .content
                .parse::<usize>()
                .ok()
                .and_then(|id| self.traces.get_mut(id))
            else {
                warn!("t={} untracked probe {} at {}", self.now_ms, packet, address);
                return;
            };

            trace.path.push(address.clone());
            if packet.dst == address {
                trace.arrived = true;
                return;
            }
            if trace.path.len() > MAX_HOPS {
                warn!("t={} probe {} exceeded {} hops", self.now_ms, packet, MAX_HOPS);
                return;
            }
        }

        self.with_router(&address, |router, outbox| router.handle_packet(port, packet, outbox));
    }

    /// Runs `f` against one router and puts whatever it sent on the wire.
    fn with_router<F>(&mut self, address: &str, f: F)
    where
        F: FnOnce(&mut Router, &mut Outbox),
    {
        let Some(router) = self.routers.get_mut(address) else {
            return;
        };
        let mut outbox = Outbox::new();
        f(router, &mut outbox);

        for (port, packet) in outbox {
            self.transmit(address, port, packet);
        }
    }

    fn transmit(&mut self, from: &str, port: PortId, packet: Packet) {
        let Some(attachment) = self.attachments.get(&(from.to_string(), port)).cloned() else {
            warn!("t={} {} sent {} on dead port {}", self.now_ms, from, packet, port);
            return;
        };

        if packet.is_routing() {
            *self.routing_sent.entry(from.to_string()).or_insert(0) += 1;
        }

        self.schedule(
            self.now_ms + attachment.latency_ms,
            Event::Deliver {
                router: attachment.peer,
                port: attachment.peer_port,
                packet,
            },
        );
    }

    fn schedule(&mut self, at_ms: u64, event: Event) {
        self.order += 1;
        self.queue.push(Scheduled {
            at_ms,
            order: self.order,
            event,
        });
    }

    fn allocate_port(&mut self, address: &str) -> PortId {
        let next = self.next_port.entry(address.to_string()).or_insert(1);
        let port = *next;
        *next += 1;
        port
    }

    fn port_between(&self, a: &str, b: &str) -> Option<PortId> {
        self.attachments
            .iter()
            .filter(|((router, _), attachment)| router == a && attachment.peer == b)
            .map(|((_, port), _)| *port)
            .min()
    }
}
