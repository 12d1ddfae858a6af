//! Error types for the wired link codecs.

use thiserror::Error;

/// Errors raised while decoding the wired byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerialError {
    /// The trailing CRC-8 did not match the received bytes.
    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// An upstream frame carried a type byte this codec does not know.
    #[error("unknown upstream message type: 0x{0:02X}")]
    UnknownMessageType(u8),
}

/// Result type alias for wired link operations.
pub type SerialResult<T> = Result<T, SerialError>;
