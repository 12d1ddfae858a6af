//! Flood coverage tracking.
//!
//! The [`FloodTracker`] follows every frame the bridge broadcasts and records
//! which nodes delivered it and how often it was relayed. Frames are keyed by
//! their bridge sequence number; a wrapped sequence replaces the old record.

use std::collections::{BTreeMap, BTreeSet};

use bandlight_metrics::{metric_defs, metrics};
use serde::Serialize;

/// Propagation of one flooded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloodRecord {
    /// Time the bridge put the frame on the air (ms).
    pub origin_ms: u64,
    /// Nodes that delivered the frame to their command handler.
    pub reached: BTreeSet<String>,
    /// Relays of this frame by any node.
    pub rebroadcasts: u32,
    /// Time of the latest delivery (ms).
    pub last_delivery_ms: Option<u64>,
}

/// Totals over every tracked frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FloodSummary {
    pub frames: usize,
    /// Frames delivered by every node.
    pub fully_covered: usize,
    /// Mean fraction of nodes reached, 0.0..=1.0.
    pub mean_coverage: f64,
    pub rebroadcasts: u64,
    /// Mean time from origin to the last delivery, over frames that reached
    /// at least one node.
    pub mean_propagation_ms: f64,
}

/// Tracks flooded frames across the simulated network.
pub struct FloodTracker {
    floods: BTreeMap<u16, FloodRecord>,
    total_nodes: usize,
}

impl FloodTracker {
    pub fn new(total_nodes: usize) -> Self {
        FloodTracker {
            floods: BTreeMap::new(),
            total_nodes,
        }
    }

    /// The bridge broadcast `sequence` at `now_ms`.
    pub fn track_send(&mut self, sequence: u16, now_ms: u64) {
        let record = FloodRecord {
            origin_ms: now_ms,
            reached: BTreeSet::new(),
            rebroadcasts: 0,
            last_delivery_ms: None,
        };
        if let Some(old) = self.floods.insert(sequence, record) {
            self.emit_record(&old);
        }
    }

    /// `node` delivered `sequence` at `now_ms`. Frames the bridge did not
    /// send are ignored.
    pub fn record_delivery(&mut self, sequence: u16, node: &str, now_ms: u64) {
        if let Some(record) = self.floods.get_mut(&sequence) {
            if record.reached.insert(node.to_string()) {
                record.last_delivery_ms = Some(now_ms);
            }
        }
    }

    /// Some node relayed `sequence`.
    pub fn record_rebroadcast(&mut self, sequence: u16) {
        if let Some(record) = self.floods.get_mut(&sequence) {
            record.rebroadcasts += 1;
        }
    }

    pub fn get(&self, sequence: u16) -> Option<&FloodRecord> {
        self.floods.get(&sequence)
    }

    /// Fraction of nodes that delivered `sequence`.
    pub fn coverage(&self, sequence: u16) -> Option<f64> {
        self.floods.get(&sequence).map(|r| self.coverage_of(r))
    }

    pub fn summary(&self) -> FloodSummary {
        let frames = self.floods.len();
        if frames == 0 {
            return FloodSummary::default();
        }
        let fully_covered = self
            .floods
            .values()
            .filter(|r| self.total_nodes > 0 && r.reached.len() == self.total_nodes)
            .count();
        let coverage: f64 = self.floods.values().map(|r| self.coverage_of(r)).sum();
        let rebroadcasts = self.floods.values().map(|r| r.rebroadcasts as u64).sum();

        let latencies: Vec<u64> = self
            .floods
            .values()
            .filter_map(|r| r.last_delivery_ms.map(|t| t - r.origin_ms))
            .collect();
        let mean_propagation_ms = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<u64>() as f64 / latencies.len() as f64
        };

        FloodSummary {
            frames,
            fully_covered,
            mean_coverage: coverage / frames as f64,
            rebroadcasts,
            mean_propagation_ms,
        }
    }

    /// Record the coverage of every tracked frame.
    pub fn emit_metrics(&self) {
        for record in self.floods.values() {
            self.emit_record(record);
        }
    }

    fn emit_record(&self, record: &FloodRecord) {
        metrics::histogram!(metric_defs::SIM_FLOOD_COVERAGE.name)
            .record(self.coverage_of(record) * 100.0);
    }

    fn coverage_of(&self, record: &FloodRecord) -> f64 {
        if self.total_nodes == 0 {
            return 0.0;
        }
        record.reached.len() as f64 / self.total_nodes as f64
    }
}
