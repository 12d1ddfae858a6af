//! # bandlight-node
//!
//! Firmware logic of one wearable node, independent of radio hardware,
//! LED drivers and flash storage.
//!
//! ## Usage
//!
//! ```
//! use bandlight_common::{ManualClock, MemoryConfigStore};
//! use bandlight_common::testing::{RecordingRenderer, RecordingTransport};
//! use bandlight_frame::{CommandFrame, Opcode, RadioAddress};
//! use bandlight_node::{Node, NodeState, NodeTimings};
//! use rand::SeedableRng;
//!
//! let clock = ManualClock::new(0);
//! let mut node = Node::new(
//!     RecordingTransport::new(RadioAddress::new([2, 0, 0, 0, 0, 1])),
//!     RecordingRenderer::new(),
//!     MemoryConfigStore::new(),
//!     clock.clone(),
//!     rand_chacha::ChaCha8Rng::seed_from_u64(1),
//!     NodeTimings::default(),
//! );
//! node.tick();
//! assert_eq!(node.state(), NodeState::Unconfigured);
//!
//! // The radio driver hands payloads to the receiver from its own context.
//! let heartbeat = CommandFrame::new(Opcode::HEARTBEAT).with_sequence(1);
//! node.receiver().on_receive(RadioAddress::BROADCAST, &heartbeat.encode());
//! node.tick();
//! assert_eq!(node.last_heartbeat(), Some(0));
//! ```

mod dedup;
mod mailbox;
mod mesh;
mod node;
mod pairing;
mod state;
mod timings;

pub use dedup::{SequenceCache, DEFAULT_CACHE_SIZE};
pub use mailbox::{mailbox, InboundFrame, InboundShort, Inbox, MailboxStats, Offer, RadioReceiver};
pub use mesh::{Disposition, MeshEngine, MeshStats, RebroadcastJob, Suppression};
pub use node::{Node, NodeParts, NodeStats, TickOutcome};
pub use pairing::PairingSession;
pub use state::{transition, Event, NodeState};
pub use timings::NodeTimings;
