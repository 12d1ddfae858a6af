//! Fixed 16-byte command frame.
//!
//! All multi-byte fields are big-endian. The layout is positional:
//!
//! ```text
//! +-----+-----+-------+--------+--------+----------+-----+---------+---+---+---+-------+-----------+
//! | seq (2)   | flags | effect | groups (2)      | duration (2)   | len | rainbow | r | g | b | speed (2) | intensity |
//! +-----+-----+-------+--------+--------+----------+-----+---------+---+---+---+-------+-----------+
//! ```
//!
//! The flags byte carries the remaining hop count in its upper nibble and
//! the [`FrameFlags`] bits in its lower nibble.

use std::fmt;

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::{FrameError, GroupMask, Opcode, FRAME_SIZE, MAX_TTL};

/// Offset of the flags/TTL byte inside an encoded frame.
pub const FLAGS_OFFSET: usize = 2;

/// Lower-nibble control flags of a command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// Deliver with priority.
    pub const PRIORITY: FrameFlags = FrameFlags(0x01);
    /// Bypass duplicate suppression.
    pub const FORCE: FrameFlags = FrameFlags(0x02);
    /// Synchronised start hint. Carried but not interpreted.
    pub const SYNC: FrameFlags = FrameFlags(0x04);
    /// Never relay this frame.
    pub const NO_REBROADCAST: FrameFlags = FrameFlags(0x08);

    pub const fn empty() -> Self {
        FrameFlags(0)
    }

    /// Build from the low nibble of a raw byte; the upper nibble is ignored.
    pub const fn from_bits(bits: u8) -> Self {
        FrameFlags(bits & 0x0F)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: FrameFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: FrameFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: FrameFlags) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for FrameFlags {
    type Output = FrameFlags;

    fn bitor(self, rhs: FrameFlags) -> FrameFlags {
        FrameFlags(self.0 | rhs.0)
    }
}

/// Combine a TTL and flags into the on-wire flags byte.
pub fn make_flags_byte(ttl: u8, flags: FrameFlags) -> u8 {
    ((ttl & MAX_TTL) << 4) | flags.bits()
}

/// TTL nibble of an encoded frame.
pub fn ttl_of(payload: &[u8; FRAME_SIZE]) -> u8 {
    payload[FLAGS_OFFSET] >> 4
}

/// Copy of `payload` with the TTL nibble set to `ttl`; every other byte
/// is untouched.
pub fn with_ttl(payload: &[u8; FRAME_SIZE], ttl: u8) -> [u8; FRAME_SIZE] {
    let mut out = *payload;
    out[FLAGS_OFFSET] = ((ttl & MAX_TTL) << 4) | (payload[FLAGS_OFFSET] & 0x0F);
    out
}

/// 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// A decoded command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    pub sequence: u16,
    /// Remaining hop count, 0..=15.
    pub ttl: u8,
    pub flags: FrameFlags,
    pub opcode: Opcode,
    pub groups: GroupMask,
    /// Milliseconds; 0 means "use the default".
    pub duration: u16,
    pub length: u8,
    pub rainbow_mode: u8,
    pub color: Rgb,
    pub speed: u16,
    pub intensity: u8,
}

impl Default for CommandFrame {
    fn default() -> Self {
        CommandFrame::new(Opcode::Nop)
    }
}

impl CommandFrame {
    /// A frame for `opcode` addressed to every node, TTL 0, no flags.
    pub fn new(opcode: Opcode) -> Self {
        CommandFrame {
            sequence: 0,
            ttl: 0,
            flags: FrameFlags::empty(),
            opcode,
            groups: GroupMask::BROADCAST,
            duration: 0,
            length: 0,
            rainbow_mode: 0,
            color: Rgb::BLACK,
            speed: 0,
            intensity: 0,
        }
    }

    pub fn with_sequence(mut self, sequence: u16) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl & MAX_TTL;
        self
    }

    pub fn with_flags(mut self, flags: FrameFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_groups(mut self, groups: GroupMask) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_duration(mut self, duration: u16) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    /// Encode to the 16-byte wire representation.
    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        let mut out = [0u8; FRAME_SIZE];
        let mut buf = &mut out[..];
        buf.put_u16(self.sequence);
        buf.put_u8(make_flags_byte(self.ttl, self.flags));
        buf.put_u8(self.opcode.to_byte());
        buf.put_u16(self.groups.bits());
        buf.put_u16(self.duration);
        buf.put_u8(self.length);
        buf.put_u8(self.rainbow_mode);
        buf.put_u8(self.color.r);
        buf.put_u8(self.color.g);
        buf.put_u8(self.color.b);
        buf.put_u16(self.speed);
        buf.put_u8(self.intensity);
        out
    }

    /// Decode a frame. `data` must be exactly [`FRAME_SIZE`] bytes.
    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        let b: &[u8; FRAME_SIZE] = data.try_into().map_err(|_| FrameError::InvalidLength {
            expected: FRAME_SIZE,
            actual: data.len(),
        })?;
        Ok(CommandFrame::from_bytes(b))
    }

    /// Decode a frame that is already known to be the right size.
    pub fn from_bytes(b: &[u8; FRAME_SIZE]) -> Self {
        CommandFrame {
            sequence: u16::from_be_bytes([b[0], b[1]]),
            ttl: b[2] >> 4,
            flags: FrameFlags::from_bits(b[2]),
            opcode: Opcode::from_byte(b[3]),
            groups: GroupMask(u16::from_be_bytes([b[4], b[5]])),
            duration: u16::from_be_bytes([b[6], b[7]]),
            length: b[8],
            rainbow_mode: b[9],
            color: Rgb::new(b[10], b[11], b[12]),
            speed: u16::from_be_bytes([b[13], b[14]]),
            intensity: b[15],
        }
    }

    pub fn is_forced(&self) -> bool {
        self.flags.contains(FrameFlags::FORCE)
    }

    pub fn is_no_rebroadcast(&self) -> bool {
        self.flags.contains(FrameFlags::NO_REBROADCAST)
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seq={} ttl={} flags=0x{:X} op={} groups={}",
            self.sequence,
            self.ttl,
            self.flags.bits(),
            self.opcode,
            self.groups
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EffectId, SystemOp};

    #[test]
    fn test_encode_layout() {
        let frame = CommandFrame {
            sequence: 0x1234,
            ttl: 3,
            flags: FrameFlags::FORCE | FrameFlags::PRIORITY,
            opcode: Opcode::Effect(EffectId::RAINBOW),
            groups: GroupMask(0x0009),
            duration: 1500,
            length: 7,
            rainbow_mode: 2,
            color: Rgb::new(10, 20, 30),
            speed: 0x0102,
            intensity: 200,
        };
        let bytes = frame.encode();
        assert_eq!(
            bytes,
            [
                0x12, 0x34, 0x33, 0x23, 0x00, 0x09, 0x05, 0xDC, 7, 2, 10, 20, 30, 0x01, 0x02,
                200
            ]
        );
        assert_eq!(CommandFrame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert_eq!(
            CommandFrame::decode(&[0u8; 15]),
            Err(FrameError::InvalidLength {
                expected: 16,
                actual: 15
            })
        );
        assert!(CommandFrame::decode(&[0u8; 17]).is_err());
    }

    #[test]
    fn test_reencode_is_byte_identical() {
        // Unknown opcode, every flag bit and a non-trivial TTL.
        let raw = [
            0xAB, 0xCD, 0xFF, 0x47, 0xFF, 0xFF, 0x00, 0x00, 1, 2, 3, 4, 5, 6, 7, 8,
        ];
        let frame = CommandFrame::decode(&raw).unwrap();
        assert_eq!(frame.ttl, 15);
        assert_eq!(frame.opcode, Opcode::Unknown(0x47));
        assert_eq!(frame.encode(), raw);
    }

    #[test]
    fn test_ttl_helpers() {
        let frame = CommandFrame::new(Opcode::System(SystemOp::Heartbeat))
            .with_ttl(2)
            .with_flags(FrameFlags::NO_REBROADCAST);
        let bytes = frame.encode();
        assert_eq!(ttl_of(&bytes), 2);

        let lowered = with_ttl(&bytes, 1);
        assert_eq!(ttl_of(&lowered), 1);
        assert_eq!(lowered[FLAGS_OFFSET] & 0x0F, FrameFlags::NO_REBROADCAST.bits());
        assert_eq!(&lowered[..2], &bytes[..2]);
        assert_eq!(&lowered[3..], &bytes[3..]);
    }

    #[test]
    fn test_flags() {
        let mut flags = FrameFlags::empty();
        flags.insert(FrameFlags::SYNC);
        assert!(flags.contains(FrameFlags::SYNC));
        assert!(!flags.contains(FrameFlags::FORCE));
        flags.remove(FrameFlags::SYNC);
        assert_eq!(flags, FrameFlags::empty());
        assert_eq!(FrameFlags::from_bits(0xF3).bits(), 0x03);
    }
}
