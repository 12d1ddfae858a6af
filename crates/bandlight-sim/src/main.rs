//! Command-line runner for Bandlight simulations.

use std::path::PathBuf;
use std::process::ExitCode;

use bandlight_sim::{duration_ms_from_secs, load_model, SimError, Simulation, SimulationStats};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bandlight-sim")]
#[command(about = "Run a deterministic Bandlight show simulation")]
struct Args {
    /// Simulation model (YAML)
    model: PathBuf,

    /// Random seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Simulated duration in seconds
    #[arg(long, default_value_t = 30.0)]
    duration_s: f64,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    bandlight_metrics::describe_metrics();

    match run(&args) {
        Ok(stats) => {
            if args.json {
                match serde_json::to_string_pretty(&stats) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to serialize results: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                print_summary(&stats);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<SimulationStats, SimError> {
    let duration_ms = duration_ms_from_secs(args.duration_s)?;
    let model = load_model(&args.model)?;
    info!(
        "Loaded {}: {} nodes, {} links",
        args.model.display(),
        model.nodes.len(),
        model.links.len()
    );
    let mut sim = Simulation::new(&model, args.seed)?;
    Ok(sim.run(duration_ms))
}

fn print_summary(stats: &SimulationStats) {
    println!(
        "Simulated {:.1} s with seed {}",
        stats.duration_ms as f64 / 1000.0,
        stats.seed
    );
    println!(
        "Medium: {} transmissions, {} delivered, {} lost",
        stats.medium.transmissions, stats.medium.delivered, stats.medium.dropped
    );
    println!(
        "Bridge: {} wired frames, {} broadcasts, {} directed, {} checksum errors",
        stats.bridge.wired_frames,
        stats.bridge.broadcasts,
        stats.bridge.directed,
        stats.bridge.checksum_errors
    );
    println!(
        "Host: {} heartbeats, {} commands, {} pairing requests, {} configured",
        stats.host.heartbeats_sent,
        stats.host.commands_sent,
        stats.host.pairing_requests,
        stats.host.config_acks_ok
    );
    println!(
        "Floods: {} frames, {} fully covered, mean coverage {:.1}%, {} relays",
        stats.flood.frames,
        stats.flood.fully_covered,
        stats.flood.mean_coverage * 100.0,
        stats.flood.rebroadcasts
    );
    println!();
    println!(
        "{:<12} {:<14} {:>4} {:>8} {:>8} {:>6} {:>6} {:>8}",
        "node", "state", "reg", "groups", "recv", "dup", "relay", "restart"
    );
    for node in &stats.nodes {
        println!(
            "{:<12} {:<14} {:>4} {:>8} {:>8} {:>6} {:>6} {:>8}",
            node.name,
            node.state.name(),
            node.register,
            node.groups.to_string(),
            node.received,
            node.duplicates,
            node.rebroadcast_sent,
            node.restarts
        );
    }
}
