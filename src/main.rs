use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use sim_router::{Algorithm, Network, SimulationConfig};

#[derive(Parser)]
#[command(name = "sim-router", about = "Simulate distance-vector or link-state routing over a network")]
struct Cli {
    /// Scenario file (JSON)
    #[arg(long)]
    config: PathBuf,

    #[arg(long, value_enum)]
    algorithm: Option<Algorithm>,

    #[arg(long)]
    heartbeat_ms: Option<u64>,

    #[arg(long)]
    duration_ms: Option<u64>,

    /// Log every routing decision
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let mut config = SimulationConfig::load(&cli.config)?;
    if let Some(algorithm) = cli.algorithm {
        config.algorithm = algorithm;
    }
    if let Some(heartbeat_ms) = cli.heartbeat_ms {
        config.heartbeat_ms = heartbeat_ms;
    }
    if let Some(duration_ms) = cli.duration_ms {
        config.duration_ms = duration_ms;
    }

    info!(
        "Simulating {} routers ({:?}, heartbeat {}ms) for {}ms",
        config.routers.len(),
        config.algorithm,
        config.heartbeat_ms,
        config.duration_ms
    );

    let mut network = Network::from_config(&config)?;
    network.advance_to(config.duration_ms);

    println!("=== Routers at t={}ms ===", network.now());
    for router in network.routers() {
        println!("{}", router);
    }

    if !network.traces().is_empty() {
        println!("\n=== Traceroutes ===");
        for trace in network.traces() {
            let status = if trace.arrived { "delivered" } else { "lost" };
            println!(
                "t={} {} -> {}: {} [{}]",
                trace.started_ms,
                trace.src,
                trace.dst,
                status,
                trace.path.join(" ")
            );
        }
    }

    Ok(())
}
