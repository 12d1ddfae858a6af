//! Wired-to-radio translation.

use bandlight_common::RadioTransport;
use bandlight_frame::{CommandFrame, Opcode, PairingMessage, RadioAddress, FRAME_SIZE};
use bandlight_metrics::{metric_defs, metrics, MetricLabels};
use bandlight_serial::{EnvelopeDecoder, UpstreamMessage};
use tracing::{debug, info, trace, warn};

use crate::{DirectedMessage, WiredLink};

// ============================================================================
// Stats
// ============================================================================

/// Counters for one bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Envelopes that passed the checksum.
    pub wired_frames: u64,
    /// Envelopes discarded for a bad checksum.
    pub checksum_errors: u64,
    /// Partial envelopes dropped after an inter-byte timeout.
    pub wired_timeouts: u64,
    /// Command frames broadcast on the radio.
    pub broadcasts: u64,
    /// Pairing replies unicast to a node.
    pub directed: u64,
    /// Wired pairing frames that could not be translated.
    pub directed_rejected: u64,
    /// Radio sends that failed.
    pub send_failures: u64,
    /// Messages written to the host.
    pub upstream_sent: u64,
    /// Host writes that failed.
    pub upstream_failures: u64,
    /// Radio payloads that were not pairing reports.
    pub radio_ignored: u64,
}

// ============================================================================
// Bridge
// ============================================================================

/// Gateway between the host's wired link and the radio mesh.
///
/// Wired bytes go in through [`feed_wired`](Bridge::feed_wired), radio
/// payloads through [`on_radio_receive`](Bridge::on_radio_receive). Nothing
/// is retried; a failed send is logged and counted.
pub struct Bridge<T, W> {
    transport: T,
    wired: W,
    decoder: EnvelopeDecoder,
    /// Sequence number for the next broadcast.
    next_sequence: u16,
    stats: BridgeStats,
    labels: MetricLabels,
}

impl<T: RadioTransport, W: WiredLink> Bridge<T, W> {
    pub fn new(transport: T, wired: W) -> Self {
        let address = transport.local_address();
        info!("Bridge {} ready", address);
        Bridge {
            transport,
            wired,
            decoder: EnvelopeDecoder::new(),
            next_sequence: 1,
            stats: BridgeStats::default(),
            labels: MetricLabels::new(address.to_string(), "bridge"),
        }
    }

    /// Start numbering broadcasts at `sequence`.
    pub fn with_initial_sequence(mut self, sequence: u16) -> Self {
        self.next_sequence = sequence;
        self
    }

    pub fn address(&self) -> RadioAddress {
        self.transport.local_address()
    }

    pub fn stats(&self) -> BridgeStats {
        let envelope = self.decoder.stats();
        BridgeStats {
            wired_frames: envelope.frames,
            checksum_errors: envelope.checksum_errors,
            wired_timeouts: envelope.timeouts,
            ..self.stats
        }
    }

    /// Sequence number the next broadcast will carry.
    pub fn next_sequence(&self) -> u16 {
        self.next_sequence
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn wired(&self) -> &W {
        &self.wired
    }

    pub fn wired_mut(&mut self) -> &mut W {
        &mut self.wired
    }

    /// Feed bytes that arrived from the host at `now_ms`.
    pub fn feed_wired(&mut self, data: &[u8], now_ms: u64) {
        for &byte in data {
            match self.decoder.feed(byte, now_ms) {
                Ok(Some(payload)) => self.handle_wired_frame(payload),
                Ok(None) => {}
                Err(e) => {
                    warn!("Dropping wired frame: {}", e);
                    metrics::counter!(
                        metric_defs::BRIDGE_CHECKSUM_ERRORS.name,
                        &self.labels.to_labels()
                    )
                    .increment(1);
                }
            }
        }
    }

    /// Periodic housekeeping: resync a wired frame that stalled.
    pub fn poll(&mut self, now_ms: u64) {
        if self.decoder.poll_timeout(now_ms) {
            debug!("Wired frame timed out, resync");
        }
    }

    fn handle_wired_frame(&mut self, payload: [u8; FRAME_SIZE]) {
        metrics::counter!(metric_defs::BRIDGE_WIRED_FRAMES.name, &self.labels.to_labels())
            .increment(1);

        let frame = CommandFrame::from_bytes(&payload);
        if let Opcode::Pairing(op) = frame.opcode {
            match DirectedMessage::from_frame(&frame) {
                Some(directed) => self.send_directed(directed),
                None => {
                    warn!("Wired frame with {:?} cannot be directed, dropped", op);
                    self.stats.directed_rejected += 1;
                }
            }
            return;
        }

        let sequence = self.take_sequence();
        let mut out = payload;
        out[..2].copy_from_slice(&sequence.to_be_bytes());
        match self.transport.send_broadcast(&out) {
            Ok(()) => {
                trace!("TX seq={} op={}", sequence, frame.opcode);
                self.stats.broadcasts += 1;
                self.count_radio_tx("broadcast");
            }
            Err(e) => {
                warn!("Broadcast of seq={} failed: {}", sequence, e);
                self.count_send_failure();
            }
        }
    }

    fn take_sequence(&mut self) -> u16 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        sequence
    }

    /// Unicast a pairing reply, holding the target in the peer table only
    /// for the duration of the send.
    fn send_directed(&mut self, directed: DirectedMessage) {
        let target = directed.target();
        let bytes = directed.to_message().encode();

        let registered = match self.transport.add_peer(target) {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not register peer {}: {}", target, e);
                false
            }
        };
        let result = self.transport.send_unicast(target, &bytes);
        if registered {
            if let Err(e) = self.transport.remove_peer(target) {
                warn!("Could not release peer {}: {}", target, e);
            }
        }

        match result {
            Ok(()) => {
                info!("{:?} -> {}", directed.to_message().opcode(), target);
                self.stats.directed += 1;
                self.count_radio_tx("unicast");
            }
            Err(e) => {
                warn!("Unicast to {} failed: {}", target, e);
                self.count_send_failure();
            }
        }
    }

    /// Handle a payload heard on the radio from `src`.
    ///
    /// Pairing requests and config acks are reported upstream under the
    /// sender's link-layer address; anything else is ignored.
    pub fn on_radio_receive(&mut self, src: RadioAddress, data: &[u8]) {
        if data.len() == FRAME_SIZE {
            trace!("Ignoring mesh frame from {}", src);
            self.stats.radio_ignored += 1;
            return;
        }
        let upstream = match PairingMessage::decode(data) {
            Ok(PairingMessage::PairingRequest { .. }) => {
                UpstreamMessage::PairingRequest { address: src }
            }
            Ok(PairingMessage::ConfigAck { success }) => UpstreamMessage::ConfigAck {
                address: src,
                success,
            },
            Ok(other) => {
                debug!("Ignoring {:?} from {}", other.opcode(), src);
                self.stats.radio_ignored += 1;
                return;
            }
            Err(e) => {
                debug!("Ignoring {}-byte payload from {}: {}", data.len(), src, e);
                self.stats.radio_ignored += 1;
                return;
            }
        };
        self.send_upstream(&upstream);
    }

    fn send_upstream(&mut self, message: &UpstreamMessage) {
        match self.wired.send_upstream(&message.encode()) {
            Ok(()) => {
                debug!("RX->host type=0x{:02X} from={}", message.type_byte(), message.address());
                self.stats.upstream_sent += 1;
                metrics::counter!(metric_defs::BRIDGE_UPSTREAM.name, &self.labels.to_labels())
                    .increment(1);
            }
            Err(e) => {
                warn!("Upstream write failed: {}", e);
                self.stats.upstream_failures += 1;
                self.count_send_failure_metric();
            }
        }
    }

    fn count_radio_tx(&self, kind: &'static str) {
        let labels = self.labels.with(&[("kind", kind.to_string())]);
        metrics::counter!(metric_defs::BRIDGE_RADIO_TX.name, &labels).increment(1);
    }

    fn count_send_failure(&mut self) {
        self.stats.send_failures += 1;
        self.count_send_failure_metric();
    }

    fn count_send_failure_metric(&self) {
        metrics::counter!(metric_defs::BRIDGE_SEND_FAILURES.name, &self.labels.to_labels())
            .increment(1);
    }
}
