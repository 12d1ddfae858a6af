//! YAML simulation model.
//!
//! ```yaml
//! bridge:
//!   name: bridge
//!   address: "24:6F:28:00:00:AA"
//! nodes:
//!   - name: n1
//!     address: "24:6F:28:00:00:01"
//!     pair_at_ms: 500
//!   - name: n2
//!     address: "24:6F:28:00:00:02"
//!     config: { register: 2, groups: 5, configured: true }
//! links:
//!   - { from: bridge, to: n1 }
//!   - { from: n1, to: n2, loss: 0.1 }
//! host:
//!   heartbeat_interval_ms: 1000
//!   commands:
//!     - { at_ms: 2000, opcode: 35, ttl: 3, duration: 1500 }
//! ```
//!
//! Links are bidirectional.

use std::collections::HashSet;
use std::path::Path;

use bandlight_common::DeviceConfig;
use bandlight_frame::{
    CommandFrame, FrameFlags, GroupMask, Opcode, RadioAddress, Rgb, DEFAULT_MESH_TTL, MAX_TTL,
};
use bandlight_node::NodeTimings;
use serde::{Deserialize, Serialize};

use crate::ModelError;

/// A complete simulation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimModel {
    pub bridge: BridgeModel,
    #[serde(default)]
    pub nodes: Vec<NodeModel>,
    #[serde(default)]
    pub links: Vec<LinkModel>,
    #[serde(default)]
    pub host: HostModel,
    /// Timings shared by every node.
    #[serde(default)]
    pub timings: NodeTimings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeModel {
    pub name: String,
    pub address: RadioAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeModel {
    pub name: String,
    pub address: RadioAddress,
    /// Stored configuration at boot. Absent means factory fresh.
    #[serde(default)]
    pub config: Option<DeviceConfig>,
    /// Simulated time at which the node's pairing button is pressed.
    #[serde(default)]
    pub pair_at_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkModel {
    pub from: String,
    pub to: String,
    /// Probability that one transmission over this link is lost.
    #[serde(default)]
    pub loss: f64,
}

/// Behaviour of the simulated host controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostModel {
    /// 0 disables heartbeats.
    pub heartbeat_interval_ms: u64,
    pub heartbeat_ttl: u8,
    /// Register handed to the first node that pairs.
    pub first_register: u8,
    pub led_count: u16,
    pub standby_color: Rgb,
    /// Delay between answering a pairing request and pushing its config.
    pub config_delay_ms: u64,
    pub commands: Vec<ScheduledCommand>,
}

impl Default for HostModel {
    fn default() -> Self {
        HostModel {
            heartbeat_interval_ms: 1_000,
            heartbeat_ttl: DEFAULT_MESH_TTL,
            first_register: 1,
            led_count: 30,
            standby_color: Rgb::new(0, 0, 50),
            config_delay_ms: 200,
            commands: Vec::new(),
        }
    }
}

/// A command frame the host sends at a fixed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledCommand {
    pub at_ms: u64,
    /// Raw opcode byte.
    pub opcode: u8,
    #[serde(default = "default_command_ttl")]
    pub ttl: u8,
    /// Raw flag nibble.
    #[serde(default)]
    pub flags: u8,
    #[serde(default = "default_command_groups")]
    pub groups: u16,
    #[serde(default)]
    pub duration: u16,
    #[serde(default)]
    pub length: u8,
    #[serde(default)]
    pub color: Option<Rgb>,
    #[serde(default)]
    pub speed: u16,
    #[serde(default)]
    pub intensity: u8,
}

fn default_command_ttl() -> u8 {
    DEFAULT_MESH_TTL
}

fn default_command_groups() -> u16 {
    GroupMask::BROADCAST.bits()
}

impl ScheduledCommand {
    /// The frame the host writes to the bridge. The bridge assigns the
    /// sequence number.
    pub fn to_frame(&self) -> CommandFrame {
        let mut frame = CommandFrame::new(Opcode::from_byte(self.opcode))
            .with_ttl(self.ttl.min(MAX_TTL))
            .with_flags(FrameFlags::from_bits(self.flags))
            .with_groups(GroupMask(self.groups))
            .with_duration(self.duration)
            .with_color(self.color.unwrap_or(Rgb::BLACK));
        frame.length = self.length;
        frame.speed = self.speed;
        frame.intensity = self.intensity;
        frame
    }
}

impl SimModel {
    /// Parse and validate a model from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, ModelError> {
        let model: SimModel = serde_yaml::from_str(yaml)?;
        model.validate()?;
        Ok(model)
    }

    /// Check names, addresses and links.
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut names = HashSet::new();
        let mut addresses = HashSet::new();
        let stations = std::iter::once((&self.bridge.name, self.bridge.address))
            .chain(self.nodes.iter().map(|n| (&n.name, n.address)));
        for (name, address) in stations {
            if !names.insert(name.as_str()) {
                return Err(ModelError::DuplicateName(name.clone()));
            }
            if !addresses.insert(address) {
                return Err(ModelError::DuplicateAddress {
                    name: name.clone(),
                    address: address.to_string(),
                });
            }
        }

        for link in &self.links {
            for end in [&link.from, &link.to] {
                if !names.contains(end.as_str()) {
                    return Err(ModelError::UnknownStation(end.clone()));
                }
            }
            if link.from == link.to {
                return Err(ModelError::SelfLink(link.from.clone()));
            }
            if !(0.0..=1.0).contains(&link.loss) {
                return Err(ModelError::InvalidLoss {
                    from: link.from.clone(),
                    to: link.to.clone(),
                    loss: link.loss,
                });
            }
        }
        Ok(())
    }

    /// Station names in index order: the bridge first, then every node.
    pub fn station_names(&self) -> Vec<String> {
        std::iter::once(self.bridge.name.clone())
            .chain(self.nodes.iter().map(|n| n.name.clone()))
            .collect()
    }
}

/// Load and validate a model file.
pub fn load_model(path: &Path) -> Result<SimModel, ModelError> {
    let text = std::fs::read_to_string(path)?;
    SimModel::from_yaml(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"
bridge:
  name: bridge
  address: "24:6F:28:00:00:AA"
nodes:
  - name: n1
    address: "24:6F:28:00:00:01"
    pair_at_ms: 500
  - name: n2
    address: "24:6F:28:00:00:02"
    config: { register: 2, groups: 5, configured: true }
links:
  - { from: bridge, to: n1 }
  - { from: n1, to: n2, loss: 0.1 }
host:
  heartbeat_interval_ms: 500
  commands:
    - { at_ms: 2000, opcode: 35, ttl: 3, duration: 1500 }
"#;

    #[test]
    fn test_parse_model() {
        let model = SimModel::from_yaml(MODEL).unwrap();
        assert_eq!(model.nodes.len(), 2);
        assert_eq!(model.nodes[0].pair_at_ms, Some(500));
        assert!(model.nodes[0].config.is_none());

        let config = model.nodes[1].config.unwrap();
        assert_eq!(config.groups, GroupMask(0x0005));
        assert_eq!(config.led_count, 30);
        assert!(config.configured);

        assert_eq!(model.links[1].loss, 0.1);
        assert_eq!(model.host.heartbeat_interval_ms, 500);
        assert_eq!(model.host.first_register, 1);
        assert_eq!(model.timings, NodeTimings::default());
        assert_eq!(model.station_names(), vec!["bridge", "n1", "n2"]);
    }

    #[test]
    fn test_scheduled_command_frame() {
        let model = SimModel::from_yaml(MODEL).unwrap();
        let frame = model.host.commands[0].to_frame();
        assert_eq!(frame.opcode, Opcode::Effect(bandlight_frame::EffectId::RAINBOW));
        assert_eq!(frame.ttl, 3);
        assert_eq!(frame.groups, GroupMask::BROADCAST);
        assert_eq!(frame.duration, 1500);
    }

    #[test]
    fn test_unknown_link_end_rejected() {
        let yaml = MODEL.replace("to: n2", "to: n9");
        assert!(matches!(
            SimModel::from_yaml(&yaml),
            Err(ModelError::UnknownStation(name)) if name == "n9"
        ));
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let yaml = MODEL.replace("24:6F:28:00:00:02", "24:6F:28:00:00:01");
        assert!(matches!(
            SimModel::from_yaml(&yaml),
            Err(ModelError::DuplicateAddress { .. })
        ));
    }

    #[test]
    fn test_demo_model_parses() {
        let model = SimModel::from_yaml(include_str!("../models/show.yaml")).unwrap();
        assert_eq!(model.nodes.len(), 7);
        assert_eq!(model.host.first_register, 4);
        assert_eq!(model.host.commands.len(), 5);
        assert_eq!(model.timings.rebroadcast_jitter_max_ms, 40);
        assert_eq!(model.nodes[4].config.unwrap().mesh_ttl, 3);
    }

    #[test]
    fn test_invalid_loss_rejected() {
        let yaml = MODEL.replace("loss: 0.1", "loss: 1.5");
        assert!(matches!(
            SimModel::from_yaml(&yaml),
            Err(ModelError::InvalidLoss { .. })
        ));
    }
}
