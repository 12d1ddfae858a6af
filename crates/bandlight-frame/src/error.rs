//! Error types for bandlight-frame.

use thiserror::Error;

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// A command frame did not have exactly the fixed frame size.
    #[error("Invalid frame length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required length.
        expected: usize,
        /// Length received.
        actual: usize,
    },

    /// A side-channel message was shorter than its layout requires.
    #[error("Message too short for {kind}: need {needed} bytes, got {actual}")]
    TooShort {
        /// Message kind being decoded.
        kind: &'static str,
        /// Minimum length for this kind.
        needed: usize,
        /// Length received.
        actual: usize,
    },

    /// A side-channel message exceeded the maximum short-message size.
    #[error("Message too long: {size} bytes (max {max})")]
    TooLong {
        /// Actual size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// First byte is not a pairing opcode this codec understands.
    #[error("Not a pairing message opcode: 0x{0:02X}")]
    NotPairingOpcode(u8),

    /// Group register outside the range allowed where it was used.
    #[error("Invalid group register: {0}")]
    InvalidRegister(u8),

    /// Address text could not be parsed.
    #[error("Invalid radio address: {0}")]
    InvalidAddress(String),
}

impl FrameError {
    /// Create a too-short error for a message kind.
    pub fn too_short(kind: &'static str, needed: usize, actual: usize) -> Self {
        FrameError::TooShort {
            kind,
            needed,
            actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FrameError::InvalidLength {
            expected: 16,
            actual: 12,
        };
        assert!(err.to_string().contains("expected 16"));

        let err = FrameError::too_short("ConfigSet", 7, 3);
        assert!(err.to_string().contains("ConfigSet"));
        assert!(err.to_string().contains("need 7"));
    }
}
