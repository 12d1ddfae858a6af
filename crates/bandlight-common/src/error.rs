//! Error types for the collaborator traits.

use bandlight_frame::RadioAddress;
use thiserror::Error;

/// Errors reported by a [`RadioTransport`](crate::RadioTransport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Unicast to an address that was never registered as a peer.
    #[error("{0} is not a registered peer")]
    NotPeer(RadioAddress),

    /// The peer table cannot hold another entry.
    #[error("peer table full")]
    PeerTableFull,

    /// The payload exceeds what the radio accepts in one transmission.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The radio rejected the transmission.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Errors reported by a [`ConfigStore`](crate::ConfigStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing storage refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
