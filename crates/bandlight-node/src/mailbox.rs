//! Single-slot inbound mailbox between the radio callback and the main loop.
//!
//! The radio driver calls [`RadioReceiver::on_receive`] from its own
//! context. That call only classifies the payload, copies it into a fixed
//! array and offers it to a capacity-one channel; if the slot is still
//! occupied the new payload is dropped. The main loop owns the [`Inbox`] and
//! drains both slots on every tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bandlight_frame::{classify_payload, PayloadKind, RadioAddress, FRAME_SIZE, MAX_SHORT_MESSAGE};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::trace;

/// A command frame waiting to be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundFrame {
    pub src: RadioAddress,
    pub payload: [u8; FRAME_SIZE],
}

/// A pairing side-channel message waiting to be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundShort {
    pub src: RadioAddress,
    len: usize,
    data: [u8; MAX_SHORT_MESSAGE],
}

impl InboundShort {
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

/// What happened to a payload handed to [`RadioReceiver::on_receive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Queued,
    /// The slot for this kind was still occupied.
    SlotFull,
    /// Neither a command frame nor a pairing message.
    Rejected,
}

#[derive(Debug, Default)]
struct DropCounters {
    slot_full: AtomicU64,
    rejected: AtomicU64,
}

/// Drop counts since the mailbox was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxStats {
    pub slot_full: u64,
    pub rejected: u64,
}

/// Producer half, handed to the radio driver.
#[derive(Debug, Clone)]
pub struct RadioReceiver {
    commands: Sender<InboundFrame>,
    pairing: Sender<InboundShort>,
    drops: Arc<DropCounters>,
}

impl RadioReceiver {
    /// Accept a payload from the radio. Never blocks and never fails.
    pub fn on_receive(&self, src: RadioAddress, data: &[u8]) -> Offer {
        let result = match classify_payload(data) {
            PayloadKind::Command => {
                let mut payload = [0u8; FRAME_SIZE];
                payload.copy_from_slice(data);
                self.commands
                    .try_send(InboundFrame { src, payload })
                    .map_err(drop_reason)
            }
            PayloadKind::Pairing => {
                let mut buf = [0u8; MAX_SHORT_MESSAGE];
                buf[..data.len()].copy_from_slice(data);
                self.pairing
                    .try_send(InboundShort {
                        src,
                        len: data.len(),
                        data: buf,
                    })
                    .map_err(drop_reason)
            }
            PayloadKind::Invalid => {
                trace!("Rejected {}-byte payload from {}", data.len(), src);
                self.drops.rejected.fetch_add(1, Ordering::Relaxed);
                return Offer::Rejected;
            }
        };
        match result {
            Ok(()) => Offer::Queued,
            Err(reason) => {
                trace!("Dropped payload from {}: {}", src, reason);
                self.drops.slot_full.fetch_add(1, Ordering::Relaxed);
                Offer::SlotFull
            }
        }
    }
}

fn drop_reason<T>(err: TrySendError<T>) -> &'static str {
    match err {
        TrySendError::Full(_) => "slot full",
        TrySendError::Disconnected(_) => "inbox closed",
    }
}

/// Consumer half, owned by the main loop.
#[derive(Debug)]
pub struct Inbox {
    commands: Receiver<InboundFrame>,
    pairing: Receiver<InboundShort>,
    drops: Arc<DropCounters>,
}

impl Inbox {
    pub fn take_command(&self) -> Option<InboundFrame> {
        self.commands.try_recv().ok()
    }

    pub fn take_pairing(&self) -> Option<InboundShort> {
        self.pairing.try_recv().ok()
    }

    pub fn stats(&self) -> MailboxStats {
        MailboxStats {
            slot_full: self.drops.slot_full.load(Ordering::Relaxed),
            rejected: self.drops.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Create a connected receiver/inbox pair.
pub fn mailbox() -> (RadioReceiver, Inbox) {
    let (cmd_tx, cmd_rx) = bounded(1);
    let (pair_tx, pair_rx) = bounded(1);
    let drops = Arc::new(DropCounters::default());
    (
        RadioReceiver {
            commands: cmd_tx,
            pairing: pair_tx,
            drops: Arc::clone(&drops),
        },
        Inbox {
            commands: cmd_rx,
            pairing: pair_rx,
            drops,
        },
    )
}
