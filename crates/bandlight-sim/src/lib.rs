//! # bandlight-sim
//!
//! Deterministic simulation of a Bandlight show: one bridge, a scripted
//! host and any number of nodes on a lossy radio graph described in YAML.
//!
//! ```
//! use bandlight_sim::{SimModel, Simulation};
//!
//! let model = SimModel::from_yaml(r#"
//! bridge: { name: bridge, address: "24:6F:28:00:00:AA" }
//! nodes:
//!   - { name: n1, address: "24:6F:28:00:00:01" }
//! links:
//!   - { from: bridge, to: n1 }
//! "#).unwrap();
//!
//! let mut sim = Simulation::new(&model, 42).unwrap();
//! let stats = sim.run(1_000);
//! assert_eq!(stats.nodes[0].heartbeats, 1);
//! ```

mod error;
pub mod flood_tracker;
pub mod host;
pub mod medium;
pub mod model;
pub mod renderer;
pub mod sim;

use std::path::Path;

pub use error::{ModelError, SimError};
pub use flood_tracker::{FloodRecord, FloodSummary, FloodTracker};
pub use host::{HostController, HostStats, PairingRecord, PairingStatus};
pub use medium::{Delivery, Medium, MediumStats, Outgoing, SimTransport, MEDIUM_LATENCY_MS};
pub use model::{load_model, BridgeModel, HostModel, LinkModel, NodeModel, ScheduledCommand, SimModel};
pub use renderer::SimRenderer;
pub use sim::{BridgeReport, NodeReport, SimNode, Simulation, SimulationStats};

/// Convert a duration in seconds to whole milliseconds.
pub fn duration_ms_from_secs(secs: f64) -> Result<u64, SimError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(SimError::InvalidDuration(format!("{} s", secs)));
    }
    Ok((secs * 1000.0).round() as u64)
}

/// Load a model file and run it for `duration_ms`.
pub fn run_model(path: &Path, seed: u64, duration_ms: u64) -> Result<SimulationStats, SimError> {
    let model = load_model(path)?;
    let mut sim = Simulation::new(&model, seed)?;
    Ok(sim.run(duration_ms))
}
