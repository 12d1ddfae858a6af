//! The simulation driver.
//!
//! One [`Simulation`] holds a bridge, its host and every node, all running on
//! a shared [`ManualClock`]. [`Simulation::step`] advances time by one
//! millisecond:
//!
//! 1. deliver radio payloads that are due,
//! 2. hand upstream reports from the bridge to the host,
//! 3. feed the host's wired output to the bridge and put its broadcasts on
//!    the air,
//! 4. press pairing buttons that are scheduled for this millisecond,
//! 5. tick every node and put what it sent on the air.
//!
//! Everything random is drawn from ChaCha8 streams derived from one seed, so
//! a seed fully determines a run.

use std::collections::HashMap;

use bandlight_bridge::{Bridge, BridgeStats, BufferedWiredLink};
use bandlight_common::{DeviceConfig, ManualClock, MemoryConfigStore};
use bandlight_frame::{GroupMask, RadioAddress, FRAME_SIZE};
use bandlight_node::{Node, NodeState, NodeStats, NodeTimings, Offer, RadioReceiver, TickOutcome};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::flood_tracker::{FloodSummary, FloodTracker};
use crate::host::{HostController, HostStats};
use crate::medium::{Medium, MediumStats, Outgoing, SimTransport};
use crate::model::SimModel;
use crate::renderer::SimRenderer;
use crate::SimError;

/// Index of the bridge in the station list.
pub const BRIDGE_INDEX: usize = 0;

/// Spacing between per-node random streams.
const NODE_SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// A node as the simulator runs it.
pub type SimNode = Node<SimTransport, SimRenderer, MemoryConfigStore, ManualClock, ChaCha8Rng>;

// ============================================================================
// Reports
// ============================================================================

/// End-of-run view of one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeReport {
    pub name: String,
    pub address: String,
    pub state: NodeState,
    pub configured: bool,
    pub register: u8,
    pub groups: GroupMask,
    /// Command frames received, including duplicates.
    pub received: u64,
    pub duplicates: u64,
    /// Frames handed to the command handler.
    pub delivered: u64,
    pub rebroadcast_sent: u64,
    pub heartbeats: u64,
    pub effects_started: u64,
    pub mailbox_dropped: u64,
    pub restarts: u32,
}

/// [`BridgeStats`] in serializable form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeReport {
    pub wired_frames: u64,
    pub checksum_errors: u64,
    pub broadcasts: u64,
    pub directed: u64,
    pub send_failures: u64,
    pub upstream_sent: u64,
}

impl From<BridgeStats> for BridgeReport {
    fn from(stats: BridgeStats) -> Self {
        BridgeReport {
            wired_frames: stats.wired_frames,
            checksum_errors: stats.checksum_errors,
            broadcasts: stats.broadcasts,
            directed: stats.directed,
            send_failures: stats.send_failures,
            upstream_sent: stats.upstream_sent,
        }
    }
}

/// Results of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationStats {
    pub seed: u64,
    /// Simulated time covered, in milliseconds.
    pub duration_ms: u64,
    pub medium: MediumStats,
    pub bridge: BridgeReport,
    pub host: HostStats,
    pub flood: FloodSummary,
    pub nodes: Vec<NodeReport>,
}

// ============================================================================
// Simulation
// ============================================================================

/// Counters of earlier incarnations of a node that restarted.
#[derive(Debug, Clone, Copy, Default)]
struct CarriedStats {
    received: u64,
    duplicates: u64,
    delivered: u64,
    rebroadcast_sent: u64,
    heartbeats: u64,
    mailbox_dropped: u64,
}

impl CarriedStats {
    fn add(&mut self, stats: &NodeStats) {
        self.received += stats.mesh.received;
        self.duplicates += stats.mesh.duplicates;
        self.delivered += stats.mesh.delivered;
        self.rebroadcast_sent += stats.mesh.rebroadcast_sent;
        self.heartbeats += stats.heartbeats;
        self.mailbox_dropped += stats.mailbox.slot_full + stats.mailbox.rejected;
    }
}

struct NodeSlot {
    name: String,
    /// Station index in the medium.
    index: usize,
    node: SimNode,
    receiver: RadioReceiver,
    pair_at_ms: Option<u64>,
    /// Sequence of the command frame sitting in the node's mailbox.
    queued_sequence: Option<u16>,
    restarts: u32,
    carried: CarriedStats,
}

/// A complete simulated show.
pub struct Simulation {
    seed: u64,
    now_ms: u64,
    clock: ManualClock,
    timings: NodeTimings,
    medium: Medium,
    bridge: Bridge<SimTransport, BufferedWiredLink>,
    host: HostController,
    nodes: Vec<NodeSlot>,
    tracker: FloodTracker,
}

impl Simulation {
    /// Build a simulation from a validated model.
    pub fn new(model: &SimModel, seed: u64) -> Result<Self, SimError> {
        model.validate()?;

        let mut addresses = vec![model.bridge.address];
        addresses.extend(model.nodes.iter().map(|n| n.address));
        let names = model.station_names();
        let index: HashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut medium = Medium::new(addresses, ChaCha8Rng::seed_from_u64(seed));
        for link in &model.links {
            if let (Some(&a), Some(&b)) = (index.get(link.from.as_str()), index.get(link.to.as_str())) {
                medium.link(a, b, link.loss);
            }
        }

        let clock = ManualClock::new(0);
        let bridge = Bridge::new(
            SimTransport::new(model.bridge.address),
            BufferedWiredLink::new(),
        );

        let nodes = model
            .nodes
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let store = match spec.config {
                    Some(config) => MemoryConfigStore::with_config(config),
                    None => MemoryConfigStore::new(),
                };
                let node = Node::new(
                    SimTransport::new(spec.address),
                    SimRenderer::new(),
                    store,
                    clock.clone(),
                    node_rng(seed, i + 1, 0),
                    model.timings,
                );
                NodeSlot {
                    name: spec.name.clone(),
                    index: i + 1,
                    receiver: node.receiver(),
                    node,
                    pair_at_ms: spec.pair_at_ms,
                    queued_sequence: None,
                    restarts: 0,
                    carried: CarriedStats::default(),
                }
            })
            .collect::<Vec<_>>();

        info!(
            "Simulation: {} nodes, {} links, seed {}",
            nodes.len(),
            model.links.len(),
            seed
        );

        Ok(Simulation {
            seed,
            now_ms: 0,
            clock,
            timings: model.timings,
            medium,
            bridge,
            host: HostController::new(model.host.clone()),
            tracker: FloodTracker::new(nodes.len()),
            nodes,
        })
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn host(&self) -> &HostController {
        &self.host
    }

    pub fn bridge(&self) -> &Bridge<SimTransport, BufferedWiredLink> {
        &self.bridge
    }

    pub fn tracker(&self) -> &FloodTracker {
        &self.tracker
    }

    pub fn node(&self, name: &str) -> Option<&SimNode> {
        self.slot(name).map(|s| &s.node)
    }

    pub fn node_state(&self, name: &str) -> Option<NodeState> {
        self.node(name).map(|n| n.state())
    }

    pub fn node_config(&self, name: &str) -> Option<DeviceConfig> {
        self.node(name).map(|n| *n.config())
    }

    /// Times the named node has restarted.
    pub fn restarts(&self, name: &str) -> Option<u32> {
        self.slot(name).map(|s| s.restarts)
    }

    /// Press the named node's pairing button now.
    pub fn trigger_pairing(&mut self, name: &str) -> bool {
        match self.nodes.iter_mut().find(|s| s.name == name) {
            Some(slot) => slot.node.trigger_pairing(),
            None => false,
        }
    }

    fn slot(&self, name: &str) -> Option<&NodeSlot> {
        self.nodes.iter().find(|s| s.name == name)
    }

    /// Run for `duration_ms` of simulated time.
    pub fn run(&mut self, duration_ms: u64) -> SimulationStats {
        let end = self.now_ms + duration_ms;
        while self.now_ms < end {
            self.step();
        }
        self.tracker.emit_metrics();
        self.stats()
    }

    /// Advance one millisecond.
    pub fn step(&mut self) {
        let now = self.now_ms;
        self.clock.set(now);

        self.deliver(now);

        let upstream = self.bridge.wired_mut().take_upstream();
        if !upstream.is_empty() {
            self.host.on_upstream(&upstream, now);
        }

        let wired = self.host.poll(now);
        if !wired.is_empty() {
            self.bridge.feed_wired(&wired, now);
        }
        self.bridge.poll(now);

        for outgoing in self.bridge.transport_mut().drain() {
            if outgoing.dest.is_none() {
                if let Some(sequence) = frame_sequence(&outgoing.payload) {
                    self.tracker.track_send(sequence, now);
                }
            }
            self.medium.transmit(BRIDGE_INDEX, outgoing, now);
        }

        for slot in &mut self.nodes {
            if slot.pair_at_ms == Some(now) && !slot.node.trigger_pairing() {
                warn!("{}: pairing button ignored in {}", slot.name, slot.node.state());
            }
        }

        for i in 0..self.nodes.len() {
            self.tick_node(i, now);
        }

        self.now_ms += 1;
    }

    fn deliver(&mut self, now: u64) {
        for delivery in self.medium.due(now) {
            if delivery.to == BRIDGE_INDEX {
                self.bridge.on_radio_receive(delivery.src, &delivery.payload);
                continue;
            }
            let Some(slot) = self.nodes.iter_mut().find(|s| s.index == delivery.to) else {
                continue;
            };
            let offer = slot.receiver.on_receive(delivery.src, &delivery.payload);
            if offer == Offer::Queued && delivery.payload.len() == FRAME_SIZE {
                slot.queued_sequence = frame_sequence(&delivery.payload);
            }
        }
    }

    fn tick_node(&mut self, i: usize, now: u64) {
        let slot = &mut self.nodes[i];
        let delivered_before = slot.node.stats().mesh.delivered;
        let outcome = slot.node.tick();

        if slot.node.stats().mesh.delivered > delivered_before {
            if let Some(sequence) = slot.queued_sequence {
                self.tracker.record_delivery(sequence, &slot.name, now);
            }
        }
        slot.queued_sequence = None;

        for outgoing in slot.node.transport_mut().drain() {
            if outgoing.dest.is_none() {
                if let Some(sequence) = frame_sequence(&outgoing.payload) {
                    self.tracker.record_rebroadcast(sequence);
                }
            }
            self.medium.transmit(slot.index, outgoing, now);
        }

        if outcome == TickOutcome::Restart {
            self.restart_node(i);
        }
    }

    /// Rebuild a node from its stored config, as a reboot would.
    fn restart_node(&mut self, i: usize) {
        let seed = self.seed;
        let timings = self.timings;
        let clock = self.clock.clone();
        let slot = &mut self.nodes[i];

        slot.restarts += 1;
        slot.carried.add(&slot.node.stats());
        debug!("{} restarting ({})", slot.name, slot.restarts);

        let node = Node::new(
            SimTransport::new(slot.node.address()),
            slot.node.renderer().clone(),
            slot.node.store().clone(),
            clock,
            node_rng(seed, slot.index, slot.restarts),
            timings,
        );
        slot.receiver = node.receiver();
        slot.node = node;
    }

    /// Snapshot of the current results.
    pub fn stats(&self) -> SimulationStats {
        SimulationStats {
            seed: self.seed,
            duration_ms: self.now_ms,
            medium: self.medium.stats(),
            bridge: self.bridge.stats().into(),
            host: self.host.stats(),
            flood: self.tracker.summary(),
            nodes: self.nodes.iter().map(node_report).collect(),
        }
    }
}

fn node_report(slot: &NodeSlot) -> NodeReport {
    let stats = slot.node.stats();
    let config = slot.node.config();
    let mut totals = slot.carried;
    totals.add(&stats);
    NodeReport {
        name: slot.name.clone(),
        address: slot.node.address().to_string(),
        state: slot.node.state(),
        configured: config.configured,
        register: config.register,
        groups: config.groups,
        received: totals.received,
        duplicates: totals.duplicates,
        delivered: totals.delivered,
        rebroadcast_sent: totals.rebroadcast_sent,
        heartbeats: totals.heartbeats,
        effects_started: slot.node.renderer().effects_started,
        mailbox_dropped: totals.mailbox_dropped,
        restarts: slot.restarts,
    }
}

fn node_rng(seed: u64, index: usize, incarnation: u32) -> ChaCha8Rng {
    let stream = seed
        .wrapping_add((index as u64).wrapping_mul(NODE_SEED_STRIDE))
        .wrapping_add(incarnation as u64);
    ChaCha8Rng::seed_from_u64(stream)
}

/// Sequence number of a 16-byte command frame.
fn frame_sequence(payload: &[u8]) -> Option<u16> {
    (payload.len() == FRAME_SIZE).then(|| u16::from_be_bytes([payload[0], payload[1]]))
}

/// Address lookup used by tests and reports.
pub fn station_address(model: &SimModel, name: &str) -> Option<RadioAddress> {
    if model.bridge.name == name {
        return Some(model.bridge.address);
    }
    model.nodes.iter().find(|n| n.name == name).map(|n| n.address)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_HOP: &str = r#"
bridge:
  name: bridge
  address: "24:6F:28:00:00:AA"
nodes:
  - name: n1
    address: "24:6F:28:00:00:01"
  - name: n2
    address: "24:6F:28:00:00:02"
links:
  - { from: bridge, to: n1 }
  - { from: n1, to: n2 }
host:
  heartbeat_interval_ms: 1000
"#;

    #[test]
    fn test_heartbeat_floods_two_hops() {
        let model = SimModel::from_yaml(TWO_HOP).unwrap();
        let mut sim = Simulation::new(&model, 1).unwrap();
        let stats = sim.run(500);

        assert_eq!(stats.host.heartbeats_sent, 1);
        assert_eq!(stats.bridge.broadcasts, 1);
        assert_eq!(stats.flood.frames, 1);
        assert_eq!(stats.flood.fully_covered, 1);
        for report in &stats.nodes {
            assert_eq!(report.delivered, 1, "{}", report.name);
            assert_eq!(report.heartbeats, 1, "{}", report.name);
        }
        assert_eq!(stats.nodes[0].rebroadcast_sent, 1);
    }

    #[test]
    fn test_frame_sequence() {
        let mut payload = [0u8; FRAME_SIZE];
        payload[0] = 0x01;
        payload[1] = 0x02;
        assert_eq!(frame_sequence(&payload), Some(0x0102));
        assert_eq!(frame_sequence(&[0x81, 1, 2]), None);
    }

    #[test]
    fn test_station_address() {
        let model = SimModel::from_yaml(TWO_HOP).unwrap();
        assert_eq!(station_address(&model, "bridge"), Some(model.bridge.address));
        assert_eq!(station_address(&model, "n2"), Some(model.nodes[1].address));
        assert_eq!(station_address(&model, "n9"), None);
    }

    #[test]
    fn test_unknown_node_lookups() {
        let model = SimModel::from_yaml(TWO_HOP).unwrap();
        let mut sim = Simulation::new(&model, 1).unwrap();
        assert!(sim.node_state("n9").is_none());
        assert!(!sim.trigger_pairing("n9"));
    }
}
