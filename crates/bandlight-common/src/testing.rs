//! Recording doubles for the collaborator traits.
//!
//! Enabled with the `test-support` feature.

use std::collections::BTreeSet;

use bandlight_frame::{CommandFrame, RadioAddress};

use crate::{Feedback, IdleScene, RadioTransport, Renderer, TransportError};

/// Peer-table operations seen by a [`RecordingTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEvent {
    Added(RadioAddress),
    Removed(RadioAddress),
}

/// A transport that records everything sent through it.
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    pub address: RadioAddress,
    pub broadcasts: Vec<Vec<u8>>,
    pub unicasts: Vec<(RadioAddress, Vec<u8>)>,
    pub peers: BTreeSet<RadioAddress>,
    pub peer_events: Vec<PeerEvent>,
    /// When set, every send fails.
    pub fail_sends: bool,
}

impl RecordingTransport {
    pub fn new(address: RadioAddress) -> Self {
        RecordingTransport {
            address,
            broadcasts: Vec::new(),
            unicasts: Vec::new(),
            peers: BTreeSet::new(),
            peer_events: Vec::new(),
            fail_sends: false,
        }
    }

    /// Take and clear the recorded broadcasts.
    pub fn take_broadcasts(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.broadcasts)
    }

    /// Take and clear the recorded unicasts.
    pub fn take_unicasts(&mut self) -> Vec<(RadioAddress, Vec<u8>)> {
        std::mem::take(&mut self.unicasts)
    }
}

impl RadioTransport for RecordingTransport {
    fn local_address(&self) -> RadioAddress {
        self.address
    }

    fn send_broadcast(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::SendFailed("recording transport".into()));
        }
        self.broadcasts.push(data.to_vec());
        Ok(())
    }

    fn send_unicast(&mut self, dest: RadioAddress, data: &[u8]) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::SendFailed("recording transport".into()));
        }
        if !self.peers.contains(&dest) {
            return Err(TransportError::NotPeer(dest));
        }
        self.unicasts.push((dest, data.to_vec()));
        Ok(())
    }

    fn add_peer(&mut self, addr: RadioAddress) -> Result<(), TransportError> {
        self.peers.insert(addr);
        self.peer_events.push(PeerEvent::Added(addr));
        Ok(())
    }

    fn remove_peer(&mut self, addr: RadioAddress) -> Result<(), TransportError> {
        self.peers.remove(&addr);
        self.peer_events.push(PeerEvent::Removed(addr));
        Ok(())
    }
}

/// One call made on a [`RecordingRenderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCall {
    Effect(CommandFrame),
    Idle(IdleScene),
    Blackout,
    Clear,
    Feedback(Feedback),
    Identify(u16),
    LedCount(u16),
}

/// A renderer that records every call except effect ticks.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    pub calls: Vec<RenderCall>,
    pub ticks: u64,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effects(&self) -> Vec<CommandFrame> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                RenderCall::Effect(frame) => Some(*frame),
                _ => None,
            })
            .collect()
    }

    pub fn feedback_seen(&self, feedback: Feedback) -> bool {
        self.calls.contains(&RenderCall::Feedback(feedback))
    }

    pub fn last_idle(&self) -> Option<IdleScene> {
        self.calls.iter().rev().find_map(|c| match c {
            RenderCall::Idle(scene) => Some(*scene),
            _ => None,
        })
    }
}

impl Renderer for RecordingRenderer {
    fn render_effect(&mut self, frame: &CommandFrame) {
        self.calls.push(RenderCall::Effect(*frame));
    }

    fn tick_effect(&mut self, _now_ms: u64) {
        self.ticks += 1;
    }

    fn show_idle(&mut self, scene: IdleScene, _now_ms: u64) {
        // Idle scenes are redrawn every tick; keep only changes.
        if self.calls.last() != Some(&RenderCall::Idle(scene)) {
            self.calls.push(RenderCall::Idle(scene));
        }
    }

    fn blackout(&mut self) {
        self.calls.push(RenderCall::Blackout);
    }

    fn clear(&mut self) {
        self.calls.push(RenderCall::Clear);
    }

    fn feedback(&mut self, feedback: Feedback) {
        self.calls.push(RenderCall::Feedback(feedback));
    }

    fn identify(&mut self, duration_ms: u16) {
        self.calls.push(RenderCall::Identify(duration_ms));
    }

    fn set_led_count(&mut self, count: u16) {
        self.calls.push(RenderCall::LedCount(count));
    }
}
