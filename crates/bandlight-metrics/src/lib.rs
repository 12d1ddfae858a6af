//! Metric declarations for Bandlight.
//!
//! Every counter, gauge and histogram the workspace emits is declared here
//! as a [`Metric`] constant, so names are never spelled twice. The `metrics`
//! crate is re-exported; without an installed recorder every call is a
//! no-op.
//!
//! # Example
//!
//! ```rust
//! use bandlight_metrics::{metric_defs, metrics, MetricLabels};
//!
//! let labels = MetricLabels::new("nano-07", "node").to_labels();
//! metrics::counter!(metric_defs::MESH_RX_FRAMES.name, &labels).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use bandlight_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const FRAMES: Metric = Metric::counter("bandlight.test.frames")
///     .with_description("Frames seen")
///     .with_unit(Unit::Count)
///     .with_labels(&["node"]);
///
/// assert_eq!(FRAMES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Expected label keys.
    pub labels: &'static [&'static str],
}

impl Metric {
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Register this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => describe_counter!(self.name, unit, self.description),
            (MetricKind::Counter, None) => describe_counter!(self.name, self.description),
            (MetricKind::Gauge, Some(unit)) => describe_gauge!(self.name, unit, self.description),
            (MetricKind::Gauge, None) => describe_gauge!(self.name, self.description),
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description)
            }
            (MetricKind::Histogram, None) => describe_histogram!(self.name, self.description),
        }
    }
}

/// All metric definitions.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels present on every station-scoped metric.
    pub const STATION_LABELS: &[&str] = &["station", "role"];

    // ------------------------------------------------------------------------
    // Mesh dissemination
    // ------------------------------------------------------------------------

    pub const MESH_RX_FRAMES: Metric = Metric::counter("bandlight.mesh.rx_frames")
        .with_description("Command frames received from the radio")
        .with_unit(Unit::Count)
        .with_labels(STATION_LABELS);

    pub const MESH_DUPLICATES: Metric = Metric::counter("bandlight.mesh.duplicates")
        .with_description("Frames dropped as already seen")
        .with_unit(Unit::Count)
        .with_labels(STATION_LABELS);

    pub const MESH_FORCED: Metric = Metric::counter("bandlight.mesh.forced")
        .with_description("Already-seen frames replayed because of the force flag")
        .with_unit(Unit::Count)
        .with_labels(STATION_LABELS);

    pub const MESH_GROUP_MISMATCH: Metric = Metric::counter("bandlight.mesh.group_mismatch")
        .with_description("Frames relayed but not delivered because no group matched")
        .with_unit(Unit::Count)
        .with_labels(STATION_LABELS);

    pub const MESH_DELIVERED: Metric = Metric::counter("bandlight.mesh.delivered")
        .with_description("Frames handed to the command handler")
        .with_unit(Unit::Count)
        .with_labels(STATION_LABELS);

    pub const MESH_REBROADCAST_SCHEDULED: Metric =
        Metric::counter("bandlight.mesh.rebroadcast_scheduled")
            .with_description("Relays scheduled after jitter")
            .with_unit(Unit::Count)
            .with_labels(STATION_LABELS);

    pub const MESH_REBROADCAST_SUPPRESSED: Metric =
        Metric::counter("bandlight.mesh.rebroadcast_suppressed")
            .with_description("Relays skipped (busy, too soon, TTL exhausted or disabled)")
            .with_unit(Unit::Count)
            .with_labels(&["station", "role", "reason"]);

    pub const MESH_REBROADCAST_SENT: Metric = Metric::counter("bandlight.mesh.rebroadcast_sent")
        .with_description("Relays transmitted")
        .with_unit(Unit::Count)
        .with_labels(STATION_LABELS);

    // ------------------------------------------------------------------------
    // Node lifecycle
    // ------------------------------------------------------------------------

    pub const NODE_STATE_TRANSITIONS: Metric = Metric::counter("bandlight.node.state_transitions")
        .with_description("Lifecycle state changes")
        .with_unit(Unit::Count)
        .with_labels(&["station", "role", "to"]);

    pub const NODE_HEARTBEAT_LOST: Metric = Metric::counter("bandlight.node.heartbeat_lost")
        .with_description("Standby nodes that stopped hearing the host")
        .with_unit(Unit::Count)
        .with_labels(STATION_LABELS);

    pub const NODE_PAIRING_REQUESTS: Metric = Metric::counter("bandlight.node.pairing_requests")
        .with_description("Pairing requests broadcast")
        .with_unit(Unit::Count)
        .with_labels(STATION_LABELS);

    pub const NODE_PAIRING_RESULT: Metric = Metric::counter("bandlight.node.pairing_result")
        .with_description("Pairing sessions finished, by outcome")
        .with_unit(Unit::Count)
        .with_labels(&["station", "role", "outcome"]);

    pub const NODE_MAILBOX_DROPPED: Metric = Metric::counter("bandlight.node.mailbox_dropped")
        .with_description("Inbound radio payloads dropped because the slot was full or the payload unclassifiable")
        .with_unit(Unit::Count)
        .with_labels(&["station", "role", "reason"]);

    // ------------------------------------------------------------------------
    // Bridge
    // ------------------------------------------------------------------------

    pub const BRIDGE_WIRED_FRAMES: Metric = Metric::counter("bandlight.bridge.wired_frames")
        .with_description("Valid envelopes received from the host")
        .with_unit(Unit::Count)
        .with_labels(STATION_LABELS);

    pub const BRIDGE_CHECKSUM_ERRORS: Metric = Metric::counter("bandlight.bridge.checksum_errors")
        .with_description("Envelopes discarded for a bad checksum")
        .with_unit(Unit::Count)
        .with_labels(STATION_LABELS);

    pub const BRIDGE_RADIO_TX: Metric = Metric::counter("bandlight.bridge.radio_tx")
        .with_description("Radio transmissions, by kind")
        .with_unit(Unit::Count)
        .with_labels(&["station", "role", "kind"]);

    pub const BRIDGE_SEND_FAILURES: Metric = Metric::counter("bandlight.bridge.send_failures")
        .with_description("Radio or wired sends that failed")
        .with_unit(Unit::Count)
        .with_labels(STATION_LABELS);

    pub const BRIDGE_UPSTREAM: Metric = Metric::counter("bandlight.bridge.upstream")
        .with_description("Messages relayed to the host")
        .with_unit(Unit::Count)
        .with_labels(STATION_LABELS);

    // ------------------------------------------------------------------------
    // Simulation
    // ------------------------------------------------------------------------

    pub const SIM_MEDIUM_DROPPED: Metric = Metric::counter("bandlight.sim.medium_dropped")
        .with_description("Transmissions lost on a simulated link");

    pub const SIM_FLOOD_COVERAGE: Metric = Metric::histogram("bandlight.sim.flood_coverage")
        .with_description("Fraction of nodes that delivered each flooded frame")
        .with_unit(Unit::Percent);

    pub const ALL: &[&Metric] = &[
        &MESH_RX_FRAMES,
        &MESH_DUPLICATES,
        &MESH_FORCED,
        &MESH_GROUP_MISMATCH,
        &MESH_DELIVERED,
        &MESH_REBROADCAST_SCHEDULED,
        &MESH_REBROADCAST_SUPPRESSED,
        &MESH_REBROADCAST_SENT,
        &NODE_STATE_TRANSITIONS,
        &NODE_HEARTBEAT_LOST,
        &NODE_PAIRING_REQUESTS,
        &NODE_PAIRING_RESULT,
        &NODE_MAILBOX_DROPPED,
        &BRIDGE_WIRED_FRAMES,
        &BRIDGE_CHECKSUM_ERRORS,
        &BRIDGE_RADIO_TX,
        &BRIDGE_SEND_FAILURES,
        &BRIDGE_UPSTREAM,
        &SIM_MEDIUM_DROPPED,
        &SIM_FLOOD_COVERAGE,
    ];
}

/// Labels identifying the station a metric belongs to.
///
/// ```rust
/// use bandlight_metrics::MetricLabels;
///
/// let labels = MetricLabels::new("bridge", "bridge").with(&[("kind", "broadcast".to_string())]);
/// assert_eq!(labels.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct MetricLabels {
    pub station: String,
    /// `node` or `bridge`.
    pub role: String,
}

impl MetricLabels {
    pub fn new(station: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            station: station.into(),
            role: role.into(),
        }
    }

    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("station", self.station.clone()), ("role", self.role.clone())]
    }

    /// Labels with additional key-value pairs appended.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Describe every metric. Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_metric_names_are_unique() {
        let names: HashSet<_> = metric_defs::ALL.iter().map(|m| m.name).collect();
        assert_eq!(names.len(), metric_defs::ALL.len());
    }

    #[test]
    fn test_metric_names_are_namespaced() {
        for metric in metric_defs::ALL {
            assert!(metric.name.starts_with("bandlight."), "{}", metric.name);
            assert!(!metric.description.is_empty(), "{} has no description", metric.name);
        }
    }

    #[test]
    fn test_labels() {
        let labels = MetricLabels::new("nano-1", "node");
        assert_eq!(
            labels.to_labels(),
            vec![("station", "nano-1".to_string()), ("role", "node".to_string())]
        );
        let extended = labels.with(&[("reason", "busy".to_string())]);
        assert!(extended.contains(&("reason", "busy".to_string())));
    }

    #[test]
    fn test_describe_without_recorder_is_noop() {
        describe_metrics();
    }
}
