use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use anyhow::{Context, Result, bail};
use crate::{Cost, RouterId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Distance vector
    Dv,
    /// Link state
    Ls,
}

/// A network scenario to simulate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub algorithm: Algorithm,
    pub heartbeat_ms: u64,
    pub tick_ms: u64,
    pub duration_ms: u64,
    /// Distance-vector cost cap, none by default.
    pub infinity: Option<Cost>,
    pub routers: Vec<RouterId>,
    pub links: Vec<LinkConfig>,
    pub changes: Vec<LinkChange>,
    pub traceroutes: Vec<TracerouteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub a: RouterId,
    pub b: RouterId,
    pub cost: Cost,
    #[serde(default = "default_latency")]
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum LinkChange {
    Up {
        at_ms: u64,
        a: RouterId,
        b: RouterId,
        cost: Cost,
        #[serde(default = "default_latency")]
        latency_ms: u64,
    },
    Down {
        at_ms: u64,
        a: RouterId,
        b: RouterId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracerouteConfig {
    pub at_ms: u64,
    pub src: RouterId,
    pub dst: RouterId,
}

fn default_latency() -> u64 {
    10
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Ls,
            heartbeat_ms: 1000,  // 1 second
            tick_ms: 10,
            duration_ms: 10_000, // 10 seconds
            infinity: None,
            routers: vec![],
            links: vec![],
            changes: vec![],
            traceroutes: vec![],
        }
    }
}

impl LinkChange {
    pub fn at_ms(&self) -> u64 {
        match self {
            LinkChange::Up { at_ms, .. } | LinkChange::Down { at_ms, .. } => *at_ms,
        }
    }
}

impl SimulationConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: SimulationConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_ms == 0 {
            bail!("heartbeat_ms must be positive");
        }
        if self.tick_ms == 0 {
            bail!("tick_ms must be positive");
        }

        let mut known = HashSet::new();
        for router in &self.routers {
            if !known.insert(router.as_str()) {
                bail!("duplicate router {}", router);
            }
        }

        let added = self.changes.iter().filter_map(|change| match change {
            LinkChange::Up { a, b, cost, .. } => Some((a, b, *cost)),
            LinkChange::Down { .. } => None,
        });
        for (a, b, cost) in self.links.iter().map(|l| (&l.a, &l.b, l.cost)).chain(added) {
            check_endpoints(&known, a, b)?;
            if cost == 0 {
                bail!("link {}-{} must have a positive cost", a, b);
            }
        }

        for change in &self.changes {
            if let LinkChange::Down { a, b, .. } = change {
                check_endpoints(&known, a, b)?;
            }
        }

        for probe in &self.traceroutes {
            check_endpoints(&known, &probe.src, &probe.dst)?;
        }

        Ok(())
    }
}

fn check_endpoints(known: &HashSet<&str>, a: &str, b: &str) -> Result<()> {
    for router in [a, b] {
        if !known.contains(router) {
            bail!("unknown router {}", router);
        }
    }
    if a == b {
        bail!("{} cannot be linked to itself", a);
    }
    Ok(())
}
