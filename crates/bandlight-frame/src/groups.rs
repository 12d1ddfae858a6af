//! Group addressing.
//!
//! A frame carries a 16-bit group mask; a node acts on it when the mask
//! shares at least one bit with the node's own mask. Bit 0 is the "all"
//! group every node belongs to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::FrameError;

/// Highest addressable group register.
pub const MAX_REGISTER: u8 = 15;

/// 16-bit group membership mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupMask(pub u16);

impl GroupMask {
    /// The group every node belongs to.
    pub const ALL: GroupMask = GroupMask(0x0001);
    /// Every group bit set.
    pub const BROADCAST: GroupMask = GroupMask(0xFFFF);
    /// No group.
    pub const NONE: GroupMask = GroupMask(0x0000);

    /// Mask for a node assigned to `register`.
    ///
    /// Register 0 means "all only"; registers 1..=15 add their own bit.
    pub fn for_register(register: u8) -> Result<Self, FrameError> {
        match register {
            0 => Ok(GroupMask::ALL),
            1..=MAX_REGISTER => Ok(GroupMask(GroupMask::ALL.0 | (1u16 << register))),
            _ => Err(FrameError::InvalidRegister(register)),
        }
    }

    /// Whether a frame addressed to `self` should be acted on by a node in
    /// `node_groups`.
    pub fn matches(self, node_groups: GroupMask) -> bool {
        self.0 & node_groups.0 != 0
    }

    pub fn contains_all(self) -> bool {
        self.0 & GroupMask::ALL.0 != 0
    }

    pub fn bits(self) -> u16 {
        self.0
    }
}

impl From<u16> for GroupMask {
    fn from(bits: u16) -> Self {
        GroupMask(bits)
    }
}

impl fmt::Display for GroupMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_register() {
        assert_eq!(GroupMask::for_register(0).unwrap(), GroupMask::ALL);
        assert_eq!(GroupMask::for_register(3).unwrap(), GroupMask(0x0009));
        assert_eq!(GroupMask::for_register(15).unwrap(), GroupMask(0x8001));
        assert_eq!(
            GroupMask::for_register(16),
            Err(FrameError::InvalidRegister(16))
        );
    }

    #[test]
    fn test_matches() {
        let node = GroupMask::for_register(3).unwrap();
        assert!(GroupMask::ALL.matches(node));
        assert!(GroupMask::BROADCAST.matches(node));
        assert!(GroupMask(0x0008).matches(node));
        assert!(!GroupMask(0x0004).matches(node));
        assert!(!GroupMask::NONE.matches(node));
    }

    #[test]
    fn test_display() {
        assert_eq!(GroupMask(0x0009).to_string(), "0x0009");
    }
}
