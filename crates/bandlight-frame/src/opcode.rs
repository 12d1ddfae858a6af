//! Opcode taxonomy.
//!
//! The effect byte of a command frame falls into one of a handful of
//! categories. Each category is a closed enum so that dispatch on it is
//! exhaustive; byte values outside every known category survive a decode /
//! encode round trip as [`Opcode::Unknown`].
//!
//! | Range       | Category |
//! |-------------|----------|
//! | `0x00`      | no-op    |
//! | `0x01-0x0F` | system   |
//! | `0x10-0x1F` | state    |
//! | `0x20-0x3F` | effect   |
//! | `0x80-0xAF` | pairing  |
//! | `0xF0-0xFF` | debug    |

use std::fmt;

/// First byte of the reserved pairing range.
pub const PAIRING_RANGE_START: u8 = 0x80;
/// Last byte of the reserved pairing range.
pub const PAIRING_RANGE_END: u8 = 0xAF;
/// First effect opcode.
pub const EFFECT_RANGE_START: u8 = 0x20;
/// Last effect opcode.
pub const EFFECT_RANGE_END: u8 = 0x3F;

/// Whether a byte lies in the reserved pairing range.
pub fn is_pairing_byte(byte: u8) -> bool {
    (PAIRING_RANGE_START..=PAIRING_RANGE_END).contains(&byte)
}

/// System-class opcodes. Handled in every node state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemOp {
    Heartbeat,
    Ping,
    Identify,
    SetLedCount,
    SetGroups,
    SaveConfig,
    Reboot,
    FactoryReset,
    SetMeshTtl,
}

impl SystemOp {
    fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x01 => SystemOp::Heartbeat,
            0x02 => SystemOp::Ping,
            0x03 => SystemOp::Identify,
            0x04 => SystemOp::SetLedCount,
            0x05 => SystemOp::SetGroups,
            0x06 => SystemOp::SaveConfig,
            0x07 => SystemOp::Reboot,
            0x0A => SystemOp::FactoryReset,
            0x0B => SystemOp::SetMeshTtl,
            _ => return None,
        })
    }

    fn to_byte(self) -> u8 {
        match self {
            SystemOp::Heartbeat => 0x01,
            SystemOp::Ping => 0x02,
            SystemOp::Identify => 0x03,
            SystemOp::SetLedCount => 0x04,
            SystemOp::SetGroups => 0x05,
            SystemOp::SaveConfig => 0x06,
            SystemOp::Reboot => 0x07,
            SystemOp::FactoryReset => 0x0A,
            SystemOp::SetMeshTtl => 0x0B,
        }
    }
}

/// State-class opcodes: direct requests for a lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateOp {
    Off,
    Standby,
    Active,
    Emergency,
    Blackout,
}

impl StateOp {
    fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x10 => StateOp::Off,
            0x11 => StateOp::Standby,
            0x12 => StateOp::Active,
            0x13 => StateOp::Emergency,
            0x14 => StateOp::Blackout,
            _ => return None,
        })
    }

    fn to_byte(self) -> u8 {
        match self {
            StateOp::Off => 0x10,
            StateOp::Standby => 0x11,
            StateOp::Active => 0x12,
            StateOp::Emergency => 0x13,
            StateOp::Blackout => 0x14,
        }
    }
}

/// Pairing-protocol opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairingOp {
    PairingAck,
    ConfigSet,
    ConfigAck,
    PairingRequest,
}

impl PairingOp {
    /// Decode a pairing opcode byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x81 => PairingOp::PairingAck,
            0x82 => PairingOp::ConfigSet,
            0x83 => PairingOp::ConfigAck,
            0xA0 => PairingOp::PairingRequest,
            _ => return None,
        })
    }

    /// Encode to the opcode byte.
    pub fn to_byte(self) -> u8 {
        match self {
            PairingOp::PairingAck => 0x81,
            PairingOp::ConfigSet => 0x82,
            PairingOp::ConfigAck => 0x83,
            PairingOp::PairingRequest => 0xA0,
        }
    }
}

/// Debug opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugOp {
    Echo,
    Info,
    Stress,
}

impl DebugOp {
    fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0xF0 => DebugOp::Echo,
            0xF1 => DebugOp::Info,
            0xF2 => DebugOp::Stress,
            _ => return None,
        })
    }

    fn to_byte(self) -> u8 {
        match self {
            DebugOp::Echo => 0xF0,
            DebugOp::Info => 0xF1,
            DebugOp::Stress => 0xF2,
        }
    }
}

/// A visual effect opcode in `0x20..=0x3F`.
///
/// The renderer owns the meaning of each effect; the protocol only needs to
/// know that it is one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u8);

impl EffectId {
    pub const SOLID: EffectId = EffectId(0x20);
    pub const BLINK: EffectId = EffectId(0x21);
    pub const FADE: EffectId = EffectId(0x22);
    pub const RAINBOW: EffectId = EffectId(0x23);
    pub const RAINBOW_CYCLE: EffectId = EffectId(0x24);
    pub const CHASE: EffectId = EffectId(0x25);
    pub const THEATER_CHASE: EffectId = EffectId(0x26);
    pub const TWINKLE: EffectId = EffectId(0x27);
    pub const SPARKLE: EffectId = EffectId(0x28);
    pub const FIRE: EffectId = EffectId(0x29);
    pub const PULSE: EffectId = EffectId(0x2A);
    pub const STROBE: EffectId = EffectId(0x2B);
    pub const GRADIENT: EffectId = EffectId(0x2C);
    pub const WAVE: EffectId = EffectId(0x2D);
    pub const METEOR: EffectId = EffectId(0x2E);
    pub const BREATHING: EffectId = EffectId(0x2F);
    pub const BOUNCE: EffectId = EffectId(0x31);
    pub const SCANNER: EffectId = EffectId(0x33);
    pub const CONFETTI: EffectId = EffectId(0x34);
    pub const LIGHTNING: EffectId = EffectId(0x35);
    pub const POLICE: EffectId = EffectId(0x36);
    pub const STACKING: EffectId = EffectId(0x37);
    pub const RIPPLE: EffectId = EffectId(0x39);
    pub const PLASMA: EffectId = EffectId(0x3A);

    /// Wrap a byte if it lies in the effect range.
    pub fn new(byte: u8) -> Option<Self> {
        (EFFECT_RANGE_START..=EFFECT_RANGE_END)
            .contains(&byte)
            .then_some(EffectId(byte))
    }

    /// Raw opcode byte.
    pub fn value(self) -> u8 {
        self.0
    }
}

/// A decoded effect/command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop,
    System(SystemOp),
    State(StateOp),
    Effect(EffectId),
    Pairing(PairingOp),
    Debug(DebugOp),
    /// Any byte outside the known categories, kept verbatim.
    Unknown(u8),
}

impl Opcode {
    pub const HEARTBEAT: Opcode = Opcode::System(SystemOp::Heartbeat);

    /// Classify a raw opcode byte.
    pub fn from_byte(byte: u8) -> Self {
        if byte == 0x00 {
            return Opcode::Nop;
        }
        if let Some(op) = SystemOp::from_byte(byte) {
            return Opcode::System(op);
        }
        if let Some(op) = StateOp::from_byte(byte) {
            return Opcode::State(op);
        }
        if let Some(effect) = EffectId::new(byte) {
            return Opcode::Effect(effect);
        }
        if let Some(op) = PairingOp::from_byte(byte) {
            return Opcode::Pairing(op);
        }
        if let Some(op) = DebugOp::from_byte(byte) {
            return Opcode::Debug(op);
        }
        Opcode::Unknown(byte)
    }

    /// Raw opcode byte.
    pub fn to_byte(self) -> u8 {
        match self {
            Opcode::Nop => 0x00,
            Opcode::System(op) => op.to_byte(),
            Opcode::State(op) => op.to_byte(),
            Opcode::Effect(effect) => effect.value(),
            Opcode::Pairing(op) => op.to_byte(),
            Opcode::Debug(op) => op.to_byte(),
            Opcode::Unknown(byte) => byte,
        }
    }

    /// Whether this opcode sits in the reserved pairing range, known or not.
    pub fn is_pairing_range(self) -> bool {
        is_pairing_byte(self.to_byte())
    }

    pub fn is_heartbeat(self) -> bool {
        self == Opcode::HEARTBEAT
    }
}

impl From<u8> for Opcode {
    fn from(byte: u8) -> Self {
        Opcode::from_byte(byte)
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> Self {
        op.to_byte()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Nop => write!(f, "NOP"),
            Opcode::System(op) => write!(f, "{:?}", op),
            Opcode::State(op) => write!(f, "State{:?}", op),
            Opcode::Effect(effect) => write!(f, "Effect(0x{:02X})", effect.value()),
            Opcode::Pairing(op) => write!(f, "{:?}", op),
            Opcode::Debug(op) => write!(f, "Debug{:?}", op),
            Opcode::Unknown(byte) => write!(f, "Unknown(0x{:02X})", byte),
        }
    }
}
