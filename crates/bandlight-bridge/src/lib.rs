//! # bandlight-bridge
//!
//! The gateway between the show host's wired link and the radio mesh.
//!
//! - Host command frames arrive in CRC-checked envelopes and are broadcast
//!   with a fresh bridge sequence number.
//! - Pairing replies ([`DirectedMessage`]) are unpacked and unicast to the
//!   node they address.
//! - Pairing requests and config acks heard on the radio are reported to
//!   the host as upstream messages.
//!
//! ```
//! use bandlight_bridge::{Bridge, BufferedWiredLink};
//! use bandlight_common::testing::RecordingTransport;
//! use bandlight_frame::{CommandFrame, Opcode, RadioAddress};
//! use bandlight_serial::encode_envelope;
//!
//! let transport = RecordingTransport::new(RadioAddress::new([2, 0, 0, 0, 0, 0xAA]));
//! let mut bridge = Bridge::new(transport, BufferedWiredLink::new());
//!
//! let heartbeat = CommandFrame::new(Opcode::HEARTBEAT).with_ttl(2);
//! bridge.feed_wired(&encode_envelope(&heartbeat.encode()), 0);
//! assert_eq!(bridge.transport().broadcasts.len(), 1);
//! ```

mod bridge;
mod directed;
mod wired;

pub use bridge::{Bridge, BridgeStats};
pub use directed::DirectedMessage;
pub use wired::{BufferedWiredLink, WiredError, WiredLink};
