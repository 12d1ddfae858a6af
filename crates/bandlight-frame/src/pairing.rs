//! Short side-channel messages used by the pairing handshake.
//!
//! These travel over the radio alongside command frames but are never
//! longer than [`MAX_SHORT_MESSAGE`] bytes, so a receiver can tell the two
//! apart by length before looking at any content.
//!
//! ```text
//! PairingRequest  [0xA0][origin address x6]
//! PairingAck      [0x81][target address x6]
//! ConfigSet       [0x82][register][led_count_hi][led_count_lo][r][g][b]
//! ConfigAck       [0x83][success 0|1]
//! ```

use bytes::BufMut;

use crate::{FrameError, PairingOp, RadioAddress, Rgb, MAX_SHORT_MESSAGE};

/// Configuration pushed to a node during pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigSet {
    pub register: u8,
    pub led_count: u16,
    pub standby_color: Rgb,
}

impl ConfigSet {
    pub const ENCODED_LEN: usize = 7;
}

/// A decoded pairing side-channel message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingMessage {
    /// A node announcing it wants configuration.
    PairingRequest { origin: RadioAddress },
    /// The host acknowledging a specific node's request.
    PairingAck { target: RadioAddress },
    ConfigSet(ConfigSet),
    /// A node reporting whether it stored the configuration.
    ConfigAck { success: bool },
}

impl PairingMessage {
    pub fn opcode(&self) -> PairingOp {
        match self {
            PairingMessage::PairingRequest { .. } => PairingOp::PairingRequest,
            PairingMessage::PairingAck { .. } => PairingOp::PairingAck,
            PairingMessage::ConfigSet(_) => PairingOp::ConfigSet,
            PairingMessage::ConfigAck { .. } => PairingOp::ConfigAck,
        }
    }

    /// Encode to the short wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MAX_SHORT_MESSAGE);
        buf.put_u8(self.opcode().to_byte());
        match self {
            PairingMessage::PairingRequest { origin } => buf.put_slice(origin.as_bytes()),
            PairingMessage::PairingAck { target } => buf.put_slice(target.as_bytes()),
            PairingMessage::ConfigSet(cfg) => {
                buf.put_u8(cfg.register);
                buf.put_u16(cfg.led_count);
                buf.put_u8(cfg.standby_color.r);
                buf.put_u8(cfg.standby_color.g);
                buf.put_u8(cfg.standby_color.b);
            }
            PairingMessage::ConfigAck { success } => buf.put_u8(u8::from(*success)),
        }
        buf
    }

    /// Decode a short message.
    ///
    /// Trailing bytes beyond a message's layout are ignored as long as the
    /// whole message fits in [`MAX_SHORT_MESSAGE`].
    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() > MAX_SHORT_MESSAGE {
            return Err(FrameError::TooLong {
                size: data.len(),
                max: MAX_SHORT_MESSAGE,
            });
        }
        let (&first, body) = data
            .split_first()
            .ok_or_else(|| FrameError::too_short("pairing message", 1, 0))?;
        let op = PairingOp::from_byte(first).ok_or(FrameError::NotPairingOpcode(first))?;

        match op {
            PairingOp::PairingRequest => {
                let origin = RadioAddress::from_slice(body)
                    .map_err(|_| FrameError::too_short("PairingRequest", 7, data.len()))?;
                Ok(PairingMessage::PairingRequest { origin })
            }
            PairingOp::PairingAck => {
                let target = RadioAddress::from_slice(body)
                    .map_err(|_| FrameError::too_short("PairingAck", 7, data.len()))?;
                Ok(PairingMessage::PairingAck { target })
            }
            PairingOp::ConfigSet => {
                if data.len() < ConfigSet::ENCODED_LEN {
                    return Err(FrameError::too_short(
                        "ConfigSet",
                        ConfigSet::ENCODED_LEN,
                        data.len(),
                    ));
                }
                Ok(PairingMessage::ConfigSet(ConfigSet {
                    register: body[0],
                    led_count: u16::from_be_bytes([body[1], body[2]]),
                    standby_color: Rgb::new(body[3], body[4], body[5]),
                }))
            }
            PairingOp::ConfigAck => {
                let status = body
                    .first()
                    .ok_or_else(|| FrameError::too_short("ConfigAck", 2, data.len()))?;
                Ok(PairingMessage::ConfigAck {
                    success: *status != 0,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: RadioAddress = RadioAddress::new([0x24, 0x6F, 0x28, 0xAA, 0xBB, 0xCC]);

    #[test]
    fn test_encoded_layouts() {
        assert_eq!(
            PairingMessage::PairingRequest { origin: ADDR }.encode(),
            vec![0xA0, 0x24, 0x6F, 0x28, 0xAA, 0xBB, 0xCC]
        );
        assert_eq!(
            PairingMessage::PairingAck { target: ADDR }.encode(),
            vec![0x81, 0x24, 0x6F, 0x28, 0xAA, 0xBB, 0xCC]
        );
        let cfg = ConfigSet {
            register: 3,
            led_count: 300,
            standby_color: Rgb::new(1, 2, 3),
        };
        assert_eq!(
            PairingMessage::ConfigSet(cfg).encode(),
            vec![0x82, 3, 0x01, 0x2C, 1, 2, 3]
        );
        assert_eq!(
            PairingMessage::ConfigAck { success: true }.encode(),
            vec![0x83, 1]
        );
    }

    #[test]
    fn test_decode_config_set() {
        let msg = PairingMessage::decode(&[0x82, 5, 0x00, 0x1E, 0, 0, 50]).unwrap();
        assert_eq!(
            msg,
            PairingMessage::ConfigSet(ConfigSet {
                register: 5,
                led_count: 30,
                standby_color: Rgb::new(0, 0, 50),
            })
        );
    }

    #[test]
    fn test_decode_short_config_set_fails() {
        let err = PairingMessage::decode(&[0x82, 5, 0x00]).unwrap_err();
        assert!(matches!(err, FrameError::TooShort { needed: 7, .. }));
    }

    #[test]
    fn test_decode_rejects_other_bytes() {
        assert_eq!(
            PairingMessage::decode(&[0x90, 1, 2]),
            Err(FrameError::NotPairingOpcode(0x90))
        );
        assert!(PairingMessage::decode(&[]).is_err());
        assert!(PairingMessage::decode(&[0x83; 9]).is_err());
    }

    #[test]
    fn test_config_ack_status() {
        assert_eq!(
            PairingMessage::decode(&[0x83, 0]).unwrap(),
            PairingMessage::ConfigAck { success: false }
        );
        assert!(PairingMessage::decode(&[0x83]).is_err());
    }
}
