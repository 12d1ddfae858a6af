//! Persistent per-node configuration.

use bandlight_frame::{ConfigSet, FrameError, GroupMask, Rgb, DEFAULT_MESH_TTL, MAX_MESH_TTL};
use serde::{Deserialize, Serialize};

/// Radio channel used when nothing else is configured.
pub const DEFAULT_RADIO_CHANNEL: u8 = 11;

/// Strip length of a factory-fresh node.
pub const DEFAULT_LED_COUNT: u16 = 30;

/// Configuration a node loads at boot and receives during pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Group register: 0 until assigned, then 1..=15.
    pub register: u8,
    pub groups: GroupMask,
    pub led_count: u16,
    pub standby_color: Rgb,
    pub max_brightness: u8,
    /// Relay hop budget for frames this node originates or relays; 0
    /// disables relaying.
    pub mesh_ttl: u8,
    pub radio_channel: u8,
    /// Set once pairing has completed.
    pub configured: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            register: 0,
            groups: GroupMask::ALL,
            led_count: DEFAULT_LED_COUNT,
            standby_color: Rgb::new(0, 0, 50),
            max_brightness: 255,
            mesh_ttl: DEFAULT_MESH_TTL,
            radio_channel: DEFAULT_RADIO_CHANNEL,
            configured: false,
        }
    }
}

impl DeviceConfig {
    /// Repair values a stored config may carry from an older or corrupted
    /// write. Returns `true` if anything changed.
    pub fn sanitize(&mut self) -> bool {
        let mut changed = false;
        if self.mesh_ttl > MAX_MESH_TTL {
            tracing::warn!(
                "Stored mesh TTL {} out of range, using {}",
                self.mesh_ttl,
                DEFAULT_MESH_TTL
            );
            self.mesh_ttl = DEFAULT_MESH_TTL;
            changed = true;
        }
        if self.configured && !self.groups.contains_all() {
            let groups = GroupMask::for_register(self.register).unwrap_or(GroupMask::ALL);
            tracing::warn!(
                "Stored groups {} lack the all-group, recomputed {}",
                self.groups,
                groups
            );
            self.groups = groups;
            changed = true;
        }
        changed
    }

    /// The configuration that results from accepting `assignment`.
    ///
    /// Fails unless the register is in `1..=15`; register 0 is reserved for
    /// unconfigured nodes. `self` is never modified.
    pub fn with_assignment(&self, assignment: &ConfigSet) -> Result<DeviceConfig, FrameError> {
        if assignment.register == 0 {
            return Err(FrameError::InvalidRegister(0));
        }
        let groups = GroupMask::for_register(assignment.register)?;
        Ok(DeviceConfig {
            register: assignment.register,
            groups,
            led_count: assignment.led_count,
            standby_color: assignment.standby_color,
            configured: true,
            ..*self
        })
    }
}
