//! Node-directed pairing replies carried over the wired link.
//!
//! The wired link only carries 16-byte command frames, so the host packs a
//! pairing reply and its target address into one:
//!
//! ```text
//! opcode        PairingAck (0x81) or ConfigSet (0x82)
//! target        red, green, blue, speed_hi, speed_lo, intensity
//! register      length
//! led_count     duration
//! standby r, g  groups (r << 8 | g)
//! standby b     rainbow_mode
//! ```
//!
//! The bridge unpacks it into the short side-channel message and unicasts
//! that to the target.

use bandlight_frame::{
    CommandFrame, ConfigSet, GroupMask, Opcode, PairingMessage, PairingOp, RadioAddress, Rgb,
};

/// A pairing reply for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectedMessage {
    PairingAck { target: RadioAddress },
    ConfigSet { target: RadioAddress, config: ConfigSet },
}

impl DirectedMessage {
    pub fn target(&self) -> RadioAddress {
        match self {
            DirectedMessage::PairingAck { target } | DirectedMessage::ConfigSet { target, .. } => {
                *target
            }
        }
    }

    /// The radio message the target receives.
    pub fn to_message(&self) -> PairingMessage {
        match *self {
            DirectedMessage::PairingAck { target } => PairingMessage::PairingAck { target },
            DirectedMessage::ConfigSet { config, .. } => PairingMessage::ConfigSet(config),
        }
    }

    /// Pack into a wired command frame (sequence 0, TTL 0).
    pub fn to_frame(&self) -> CommandFrame {
        let a = self.target().0;
        let mut frame = match self {
            DirectedMessage::PairingAck { .. } => {
                CommandFrame::new(Opcode::Pairing(PairingOp::PairingAck))
                    .with_groups(GroupMask::NONE)
            }
            DirectedMessage::ConfigSet { config, .. } => {
                let Rgb { r, g, b } = config.standby_color;
                let mut frame = CommandFrame::new(Opcode::Pairing(PairingOp::ConfigSet))
                    .with_groups(GroupMask(u16::from_be_bytes([r, g])))
                    .with_duration(config.led_count);
                frame.length = config.register;
                frame.rainbow_mode = b;
                frame
            }
        };
        frame.color = Rgb::new(a[0], a[1], a[2]);
        frame.speed = u16::from_be_bytes([a[3], a[4]]);
        frame.intensity = a[5];
        frame
    }

    /// Unpack a wired frame. Returns `None` unless the opcode is
    /// `PairingAck` or `ConfigSet`.
    pub fn from_frame(frame: &CommandFrame) -> Option<Self> {
        let [s0, s1] = frame.speed.to_be_bytes();
        let target = RadioAddress::new([
            frame.color.r,
            frame.color.g,
            frame.color.b,
            s0,
            s1,
            frame.intensity,
        ]);
        match frame.opcode {
            Opcode::Pairing(PairingOp::PairingAck) => Some(DirectedMessage::PairingAck { target }),
            Opcode::Pairing(PairingOp::ConfigSet) => {
                let [r, g] = frame.groups.bits().to_be_bytes();
                Some(DirectedMessage::ConfigSet {
                    target,
                    config: ConfigSet {
                        register: frame.length,
                        led_count: frame.duration,
                        standby_color: Rgb::new(r, g, frame.rainbow_mode),
                    },
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: RadioAddress = RadioAddress::new([0x24, 0x6F, 0x28, 0xA1, 0xB2, 0xC3]);

    #[test]
    fn test_config_set_field_placement() {
        let msg = DirectedMessage::ConfigSet {
            target: TARGET,
            config: ConfigSet {
                register: 3,
                led_count: 60,
                standby_color: Rgb::new(0x11, 0x22, 0x33),
            },
        };
        let bytes = msg.to_frame().encode();

        assert_eq!(bytes[3], 0x82);
        assert_eq!(&bytes[4..6], &[0x11, 0x22]);
        assert_eq!(&bytes[6..8], &[0x00, 60]);
        assert_eq!(bytes[8], 3);
        assert_eq!(bytes[9], 0x33);
        assert_eq!(&bytes[10..13], &[0x24, 0x6F, 0x28]);
        assert_eq!(&bytes[13..15], &[0xA1, 0xB2]);
        assert_eq!(bytes[15], 0xC3);

        let decoded = CommandFrame::decode(&bytes).unwrap();
        assert_eq!(DirectedMessage::from_frame(&decoded), Some(msg));
    }

    #[test]
    fn test_pairing_ack_target() {
        let msg = DirectedMessage::PairingAck { target: TARGET };
        let frame = msg.to_frame();
        assert_eq!(DirectedMessage::from_frame(&frame), Some(msg));
        assert_eq!(
            msg.to_message(),
            PairingMessage::PairingAck { target: TARGET }
        );
    }

    #[test]
    fn test_other_opcodes_are_not_directed() {
        let frame = CommandFrame::new(Opcode::Pairing(PairingOp::ConfigAck));
        assert_eq!(DirectedMessage::from_frame(&frame), None);
        assert_eq!(DirectedMessage::from_frame(&CommandFrame::new(Opcode::HEARTBEAT)), None);
    }
}
