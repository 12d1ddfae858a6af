//! Wired link between the host controller and the radio bridge.
//!
//! Two directions, two framings:
//!
//! - **Host → bridge**: 16-byte command frames wrapped in an [`ENVELOPE_START`]
//!   envelope with a CRC-8 trailer, decoded byte by byte by
//!   [`EnvelopeDecoder`].
//! - **Bridge → host**: short [`UpstreamMessage`]s (pairing requests and
//!   config acks seen on the radio), decoded on the host by
//!   [`UpstreamDecoder`].

mod envelope;
mod error;
mod upstream;

pub use envelope::*;
pub use error::*;
pub use upstream::*;
