//! Timing parameters for a node.

use serde::{Deserialize, Serialize};

/// All timeouts and intervals a node runs on, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeTimings {
    /// Upper bound (exclusive) of the random delay before a relay.
    pub rebroadcast_jitter_max_ms: u64,
    /// Minimum time between two relays.
    pub rebroadcast_min_gap_ms: u64,
    pub pairing_request_interval_ms: u64,
    pub pairing_timeout_ms: u64,
    /// Standby becomes Disconnected after this long without a heartbeat.
    pub heartbeat_timeout_ms: u64,
    /// Effect length when a frame carries duration 0.
    pub default_effect_duration_ms: u64,
    /// Blackout length before the show's first heartbeat.
    pub blackout_preshow_ms: u64,
    /// Blackout length once heartbeats are flowing.
    pub blackout_midshow_ms: u64,
}

impl Default for NodeTimings {
    fn default() -> Self {
        NodeTimings {
            rebroadcast_jitter_max_ms: 50,
            rebroadcast_min_gap_ms: 20,
            pairing_request_interval_ms: 2_000,
            pairing_timeout_ms: 15_000,
            heartbeat_timeout_ms: 10_000,
            default_effect_duration_ms: 2_000,
            blackout_preshow_ms: 2_000,
            blackout_midshow_ms: 60_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let timings: NodeTimings = serde_yaml::from_str("heartbeat_timeout_ms: 5000\n").unwrap();
        assert_eq!(timings.heartbeat_timeout_ms, 5_000);
        assert_eq!(timings.pairing_timeout_ms, 15_000);
    }
}
