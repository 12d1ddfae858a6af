//! Bandlight wire formats.
//!
//! This crate defines everything that crosses the radio between the bridge
//! and the wearable nodes:
//!
//! - the fixed 16-byte [`CommandFrame`] and its opcode taxonomy,
//! - [`GroupMask`] addressing,
//! - [`RadioAddress`] link-layer addresses,
//! - the short pairing side-channel ([`PairingMessage`]),
//! - the CRC-8 used by the wired bridge link.
//!
//! # Example
//!
//! ```rust
//! use bandlight_frame::{CommandFrame, EffectId, GroupMask, Opcode, Rgb};
//!
//! let frame = CommandFrame::new(Opcode::Effect(EffectId::SOLID))
//!     .with_sequence(42)
//!     .with_ttl(2)
//!     .with_groups(GroupMask::ALL)
//!     .with_color(Rgb::new(255, 0, 0));
//! let bytes = frame.encode();
//! assert_eq!(CommandFrame::decode(&bytes).unwrap(), frame);
//! ```

mod address;
mod crc;
mod error;
mod frame;
mod groups;
mod opcode;
mod pairing;

pub use address::*;
pub use crc::*;
pub use error::*;
pub use frame::*;
pub use groups::*;
pub use opcode::*;
pub use pairing::*;

/// Size of an encoded [`CommandFrame`].
pub const FRAME_SIZE: usize = 16;

/// Largest pairing side-channel message.
pub const MAX_SHORT_MESSAGE: usize = 8;

/// Largest value the TTL nibble can hold.
pub const MAX_TTL: u8 = 0x0F;

/// Largest relay TTL a node accepts as configuration.
pub const MAX_MESH_TTL: u8 = 7;

/// Relay TTL for unconfigured nodes and host heartbeats.
pub const DEFAULT_MESH_TTL: u8 = 2;

/// Classify an inbound radio payload by its length and first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Exactly [`FRAME_SIZE`] bytes.
    Command,
    /// At most [`MAX_SHORT_MESSAGE`] bytes starting with a pairing-range byte.
    Pairing,
    Invalid,
}

/// Decide which path an inbound radio payload takes.
///
/// Length is checked first, so a command frame whose sequence high byte
/// happens to fall into the pairing range is still a command frame.
pub fn classify_payload(data: &[u8]) -> PayloadKind {
    match data.len() {
        FRAME_SIZE => PayloadKind::Command,
        1..=MAX_SHORT_MESSAGE if is_pairing_byte(data[0]) => PayloadKind::Pairing,
        _ => {
            log::trace!("Unclassifiable payload of {} bytes", data.len());
            PayloadKind::Invalid
        }
    }
}
