use std::collections::BTreeMap;
use std::fmt;
use crate::{Cost, PortId, RouterId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardingEntry {
    pub port: PortId,
    pub cost: Cost,
}

/// Destination → outgoing port, derived from routing state.
///
/// Engines rebuild it from scratch on every relevant change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardingTable {
    entries: BTreeMap<RouterId, ForwardingEntry>,
}

impl ForwardingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, destination: RouterId, port: PortId, cost: Cost) {
        self.entries.insert(destination, ForwardingEntry { port, cost });
    }

    pub fn lookup(&self, destination: &str) -> Option<PortId> {
        self.entries.get(destination).map(|entry| entry.port)
    }

    pub fn get(&self, destination: &str) -> Option<&ForwardingEntry> {
        self.entries.get(destination)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RouterId, &ForwardingEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(RouterId, ForwardingEntry)> for ForwardingTable {
    fn from_iter<I: IntoIterator<Item = (RouterId, ForwardingEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ForwardingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (destination, entry) in &self.entries {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}->{}", destination, entry.port)?;
            first = false;
        }
        Ok(())
    }
}
