//! Lifecycle states and the transition table.
//!
//! [`transition`] is pure: it maps a state and an event to the next state and
//! nothing else. Side effects (rendering, persistence, radio traffic) live in
//! [`Node`](crate::Node), which decides which events to raise.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Node lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    Init,
    Unconfigured,
    Pairing,
    Connecting,
    Standby,
    Active,
    Blackout,
    Disconnected,
}

impl NodeState {
    pub fn name(self) -> &'static str {
        match self {
            NodeState::Init => "INIT",
            NodeState::Unconfigured => "UNCONFIGURED",
            NodeState::Pairing => "PAIRING",
            NodeState::Connecting => "CONNECTING",
            NodeState::Standby => "STANDBY",
            NodeState::Active => "ACTIVE",
            NodeState::Blackout => "BLACKOUT",
            NodeState::Disconnected => "DISCONNECTED",
        }
    }

    /// Whether effect and state opcodes are honoured. Show traffic never
    /// interrupts boot or a pairing session, and an unconfigured node only
    /// leaves `Unconfigured` through pairing.
    pub fn accepts_show_traffic(self) -> bool {
        !matches!(
            self,
            NodeState::Init | NodeState::Unconfigured | NodeState::Pairing
        )
    }

    /// Whether a local pairing trigger is accepted.
    pub fn can_start_pairing(self) -> bool {
        matches!(
            self,
            NodeState::Unconfigured
                | NodeState::Connecting
                | NodeState::Standby
                | NodeState::Disconnected
        )
    }

    /// Whether an unsolicited configuration push is accepted.
    pub fn accepts_config(self) -> bool {
        matches!(self, NodeState::Pairing | NodeState::Unconfigured)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Something that happened to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Stored configuration was loaded.
    Booted { configured: bool },
    PairingTriggered,
    /// A configuration push was persisted.
    ConfigAccepted,
    /// The pairing window closed without a configuration.
    PairingTimedOut { configured: bool },
    Heartbeat,
    HeartbeatLost,
    EffectStarted,
    EffectFinished,
    StandbyRequested,
    BlackoutRequested,
    BlackoutFinished,
}

/// The lifecycle transition table.
pub fn transition(state: NodeState, event: Event) -> NodeState {
    use NodeState::*;

    match (state, event) {
        (Init, Event::Booted { configured: true }) => Connecting,
        (Init, Event::Booted { configured: false }) => Unconfigured,

        (s, Event::PairingTriggered) if s.can_start_pairing() => Pairing,
        (s, Event::ConfigAccepted) if s.accepts_config() => Connecting,
        (Pairing, Event::PairingTimedOut { configured: true }) => Connecting,
        (Pairing, Event::PairingTimedOut { configured: false }) => Unconfigured,

        (Connecting | Disconnected, Event::Heartbeat) => Standby,
        (Standby, Event::HeartbeatLost) => Disconnected,

        (s, Event::EffectStarted) if s.accepts_show_traffic() => Active,
        (Active, Event::EffectFinished) => Standby,
        (s, Event::StandbyRequested) if s.accepts_show_traffic() => Standby,
        (s, Event::BlackoutRequested) if s.accepts_show_traffic() => Blackout,
        (Blackout, Event::BlackoutFinished) => Standby,

        (s, _) => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use NodeState::*;

    const ALL_STATES: [NodeState; 8] = [
        Init,
        Unconfigured,
        Pairing,
        Connecting,
        Standby,
        Active,
        Blackout,
        Disconnected,
    ];

    #[test]
    fn test_boot() {
        assert_eq!(transition(Init, Event::Booted { configured: true }), Connecting);
        assert_eq!(
            transition(Init, Event::Booted { configured: false }),
            Unconfigured
        );
        assert_eq!(
            transition(Standby, Event::Booted { configured: false }),
            Standby
        );
    }

    #[test]
    fn test_heartbeat() {
        assert_eq!(transition(Connecting, Event::Heartbeat), Standby);
        assert_eq!(transition(Disconnected, Event::Heartbeat), Standby);
        assert_eq!(transition(Active, Event::Heartbeat), Active);
        assert_eq!(transition(Blackout, Event::Heartbeat), Blackout);
        assert_eq!(transition(Pairing, Event::Heartbeat), Pairing);
        assert_eq!(transition(Unconfigured, Event::Heartbeat), Unconfigured);
    }

    #[test]
    fn test_heartbeat_lost_only_from_standby() {
        for state in ALL_STATES {
            let expected = if state == Standby { Disconnected } else { state };
            assert_eq!(transition(state, Event::HeartbeatLost), expected);
        }
    }

    #[test]
    fn test_pairing_trigger() {
        for state in ALL_STATES {
            let next = transition(state, Event::PairingTriggered);
            if state.can_start_pairing() {
                assert_eq!(next, Pairing);
            } else {
                assert_eq!(next, state);
            }
        }
        assert_eq!(transition(Active, Event::PairingTriggered), Active);
    }

    #[test]
    fn test_pairing_outcomes() {
        assert_eq!(transition(Pairing, Event::ConfigAccepted), Connecting);
        assert_eq!(transition(Unconfigured, Event::ConfigAccepted), Connecting);
        assert_eq!(transition(Standby, Event::ConfigAccepted), Standby);
        assert_eq!(
            transition(Pairing, Event::PairingTimedOut { configured: false }),
            Unconfigured
        );
        assert_eq!(
            transition(Pairing, Event::PairingTimedOut { configured: true }),
            Connecting
        );
    }

    #[test]
    fn test_show_traffic_ignored_before_configuration() {
        for event in [
            Event::EffectStarted,
            Event::StandbyRequested,
            Event::BlackoutRequested,
        ] {
            assert_eq!(transition(Init, event), Init);
            assert_eq!(transition(Unconfigured, event), Unconfigured);
            assert_eq!(transition(Pairing, event), Pairing);
        }
        assert_eq!(transition(Standby, Event::EffectStarted), Active);
        assert_eq!(transition(Active, Event::EffectStarted), Active);
        assert_eq!(transition(Standby, Event::BlackoutRequested), Blackout);
    }

    #[test]
    fn test_effect_and_blackout_expiry() {
        assert_eq!(transition(Active, Event::EffectFinished), Standby);
        assert_eq!(transition(Standby, Event::EffectFinished), Standby);
        assert_eq!(transition(Blackout, Event::BlackoutFinished), Standby);
        assert_eq!(transition(Active, Event::BlackoutFinished), Active);
    }
}
