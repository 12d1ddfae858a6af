//! Flood-based mesh dissemination.
//!
//! Each inbound command frame yields at most one local delivery and at most
//! one relay. A relay is the same 16 bytes with the TTL nibble lowered by
//! one, sent after a random jitter so neighbours that heard the same frame
//! do not all transmit at once.

use bandlight_frame::{with_ttl, CommandFrame, GroupMask, FRAME_SIZE};
use bandlight_metrics::{metric_defs, metrics, MetricLabels};
use rand::{Rng, RngCore};
use tracing::{debug, trace};

use crate::dedup::{SequenceCache, DEFAULT_CACHE_SIZE};
use crate::NodeTimings;

/// A relay waiting for its jitter to elapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebroadcastJob {
    /// Payload with the TTL already decremented.
    pub payload: [u8; FRAME_SIZE],
    pub due_at: u64,
}

/// Why a relay was not scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// TTL was already 0.
    TtlExhausted,
    /// The frame carries the no-rebroadcast flag.
    NoRebroadcastFlag,
    /// This node has relaying disabled.
    Disabled,
    /// Another relay is still pending.
    Busy,
    /// The previous relay was too recent.
    TooSoon,
}

impl Suppression {
    fn as_str(self) -> &'static str {
        match self {
            Suppression::TtlExhausted => "ttl",
            Suppression::NoRebroadcastFlag => "flag",
            Suppression::Disabled => "disabled",
            Suppression::Busy => "busy",
            Suppression::TooSoon => "gap",
        }
    }
}

/// What the engine decided for one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Already seen and not forced; nothing happens.
    Duplicate,
    /// A 16-byte frame carrying a pairing opcode; recorded but never acted on.
    PairingFrame,
    /// Not addressed to any of this node's groups.
    NotForUs,
    /// Hand this frame to the state machine.
    Deliver(CommandFrame),
}

/// Counters kept by the [`MeshEngine`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshStats {
    pub received: u64,
    pub duplicates: u64,
    pub forced: u64,
    pub pairing_frames: u64,
    pub group_mismatch: u64,
    pub delivered: u64,
    pub rebroadcast_scheduled: u64,
    pub suppressed_ttl: u64,
    pub suppressed_flag: u64,
    pub suppressed_busy: u64,
    pub suppressed_gap: u64,
    pub suppressed_disabled: u64,
    pub rebroadcast_sent: u64,
}

/// Dedup, group filtering and relay scheduling for one node.
#[derive(Debug)]
pub struct MeshEngine<const N: usize = DEFAULT_CACHE_SIZE> {
    cache: SequenceCache<N>,
    pending: Option<RebroadcastJob>,
    last_rebroadcast_at: Option<u64>,
    jitter_max_ms: u64,
    min_gap_ms: u64,
    stats: MeshStats,
    labels: Vec<(&'static str, String)>,
    metric_labels: MetricLabels,
}

impl<const N: usize> MeshEngine<N> {
    pub fn new(timings: &NodeTimings, labels: MetricLabels) -> Self {
        MeshEngine {
            cache: SequenceCache::new(),
            pending: None,
            last_rebroadcast_at: None,
            jitter_max_ms: timings.rebroadcast_jitter_max_ms,
            min_gap_ms: timings.rebroadcast_min_gap_ms,
            stats: MeshStats::default(),
            labels: labels.to_labels(),
            metric_labels: labels,
        }
    }

    pub fn stats(&self) -> MeshStats {
        self.stats
    }

    pub fn pending(&self) -> Option<&RebroadcastJob> {
        self.pending.as_ref()
    }

    pub fn has_seen(&self, sequence: u16) -> bool {
        self.cache.contains(sequence)
    }

    /// Run one inbound frame through dedup, group matching and relay
    /// scheduling.
    ///
    /// `relay_enabled` is false when the node's configured mesh TTL is 0.
    pub fn on_frame<G: RngCore>(
        &mut self,
        payload: &[u8; FRAME_SIZE],
        node_groups: GroupMask,
        relay_enabled: bool,
        now: u64,
        rng: &mut G,
    ) -> Disposition {
        self.stats.received += 1;
        metrics::counter!(metric_defs::MESH_RX_FRAMES.name, &self.labels).increment(1);

        let frame = CommandFrame::from_bytes(payload);
        let seen = self.cache.contains(frame.sequence);
        if seen && !frame.is_forced() {
            trace!("Duplicate seq={}, dropped", frame.sequence);
            self.stats.duplicates += 1;
            metrics::counter!(metric_defs::MESH_DUPLICATES.name, &self.labels).increment(1);
            return Disposition::Duplicate;
        }
        if seen {
            self.stats.forced += 1;
            metrics::counter!(metric_defs::MESH_FORCED.name, &self.labels).increment(1);
        }
        self.cache.insert(frame.sequence);

        if frame.opcode.is_pairing_range() {
            debug!(
                "Ignoring 16-byte pairing frame seq={} op={}",
                frame.sequence, frame.opcode
            );
            self.stats.pairing_frames += 1;
            return Disposition::PairingFrame;
        }

        self.maybe_schedule(payload, &frame, relay_enabled, now, rng);

        if !frame.groups.matches(node_groups) {
            trace!(
                "seq={} groups={} not for {}",
                frame.sequence,
                frame.groups,
                node_groups
            );
            self.stats.group_mismatch += 1;
            metrics::counter!(metric_defs::MESH_GROUP_MISMATCH.name, &self.labels).increment(1);
            return Disposition::NotForUs;
        }

        self.stats.delivered += 1;
        metrics::counter!(metric_defs::MESH_DELIVERED.name, &self.labels).increment(1);
        Disposition::Deliver(frame)
    }

    fn maybe_schedule<G: RngCore>(
        &mut self,
        payload: &[u8; FRAME_SIZE],
        frame: &CommandFrame,
        relay_enabled: bool,
        now: u64,
        rng: &mut G,
    ) {
        match self.schedule(payload, frame, relay_enabled, now, rng) {
            Ok(job) => {
                trace!("Relay of seq={} due at {}", frame.sequence, job.due_at);
                self.stats.rebroadcast_scheduled += 1;
                metrics::counter!(metric_defs::MESH_REBROADCAST_SCHEDULED.name, &self.labels)
                    .increment(1);
            }
            Err(reason) => {
                match reason {
                    Suppression::TtlExhausted => self.stats.suppressed_ttl += 1,
                    Suppression::NoRebroadcastFlag => self.stats.suppressed_flag += 1,
                    Suppression::Disabled => self.stats.suppressed_disabled += 1,
                    Suppression::Busy => self.stats.suppressed_busy += 1,
                    Suppression::TooSoon => self.stats.suppressed_gap += 1,
                }
                let labels = self
                    .metric_labels
                    .with(&[("reason", reason.as_str().to_string())]);
                metrics::counter!(metric_defs::MESH_REBROADCAST_SUPPRESSED.name, &labels)
                    .increment(1);
            }
        }
    }

    fn schedule<G: RngCore>(
        &mut self,
        payload: &[u8; FRAME_SIZE],
        frame: &CommandFrame,
        relay_enabled: bool,
        now: u64,
        rng: &mut G,
    ) -> Result<RebroadcastJob, Suppression> {
        if frame.is_no_rebroadcast() {
            return Err(Suppression::NoRebroadcastFlag);
        }
        if frame.ttl == 0 {
            return Err(Suppression::TtlExhausted);
        }
        if !relay_enabled {
            return Err(Suppression::Disabled);
        }
        if self.pending.is_some() {
            return Err(Suppression::Busy);
        }
        if let Some(last) = self.last_rebroadcast_at {
            if now.saturating_sub(last) < self.min_gap_ms {
                return Err(Suppression::TooSoon);
            }
        }

        let jitter = if self.jitter_max_ms == 0 {
            0
        } else {
            rng.gen_range(0..self.jitter_max_ms)
        };
        let job = RebroadcastJob {
            payload: with_ttl(payload, frame.ttl - 1),
            due_at: now + jitter,
        };
        self.pending = Some(job);
        Ok(job)
    }

    /// Take the pending relay if it is due. The caller transmits it.
    pub fn poll_rebroadcast(&mut self, now: u64) -> Option<[u8; FRAME_SIZE]> {
        match self.pending {
            Some(job) if now >= job.due_at => {
                self.pending = None;
                self.last_rebroadcast_at = Some(now);
                self.stats.rebroadcast_sent += 1;
                metrics::counter!(metric_defs::MESH_REBROADCAST_SENT.name, &self.labels)
                    .increment(1);
                Some(job.payload)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bandlight_frame::{ttl_of, EffectId, FrameFlags, Opcode, PairingOp};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn engine() -> MeshEngine {
        MeshEngine::new(&NodeTimings::default(), MetricLabels::new("test", "node"))
    }

    fn effect(seq: u16, ttl: u8) -> CommandFrame {
        CommandFrame::new(Opcode::Effect(EffectId::SOLID))
            .with_sequence(seq)
            .with_ttl(ttl)
            .with_groups(GroupMask::ALL)
    }

    #[test]
    fn test_first_arrival_delivers_and_schedules() {
        let mut mesh = engine();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let frame = effect(7, 2);
        let d = mesh.on_frame(&frame.encode(), GroupMask::ALL, true, 1000, &mut rng);
        assert_eq!(d, Disposition::Deliver(frame));

        let job = *mesh.pending().unwrap();
        assert!(job.due_at >= 1000 && job.due_at < 1050);
        assert_eq!(ttl_of(&job.payload), 1);
        assert_eq!(&job.payload[..2], &frame.encode()[..2]);
        assert_eq!(job.payload[3], frame.encode()[3]);
    }

    #[test]
    fn test_duplicate_is_dropped_without_relay() {
        let mut mesh = engine();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let bytes = effect(7, 2).encode();
        mesh.on_frame(&bytes, GroupMask::ALL, true, 0, &mut rng);
        assert!(mesh.poll_rebroadcast(100).is_some());

        let d = mesh.on_frame(&bytes, GroupMask::ALL, true, 200, &mut rng);
        assert_eq!(d, Disposition::Duplicate);
        assert!(mesh.pending().is_none());
        assert_eq!(mesh.stats().duplicates, 1);
        assert_eq!(mesh.stats().delivered, 1);
    }

    #[test]
    fn test_forced_duplicate_acts_like_first_arrival() {
        let mut mesh = engine();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let frame = effect(9, 3).with_flags(FrameFlags::FORCE);
        mesh.on_frame(&frame.encode(), GroupMask::ALL, true, 0, &mut rng);
        mesh.poll_rebroadcast(100);

        let d = mesh.on_frame(&frame.encode(), GroupMask::ALL, true, 200, &mut rng);
        assert_eq!(d, Disposition::Deliver(frame));
        assert_eq!(ttl_of(&mesh.pending().unwrap().payload), 2);
        assert_eq!(mesh.stats().forced, 1);
    }

    #[test]
    fn test_ttl_zero_never_relays() {
        let mut mesh = engine();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let frame = effect(1, 0).with_flags(FrameFlags::FORCE);
        let d = mesh.on_frame(&frame.encode(), GroupMask::ALL, true, 0, &mut rng);
        assert!(matches!(d, Disposition::Deliver(_)));
        assert!(mesh.pending().is_none());
        assert_eq!(mesh.stats().suppressed_ttl, 1);
    }

    #[test]
    fn test_group_mismatch_still_relays() {
        let mut mesh = engine();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let frame = effect(1, 2).with_groups(GroupMask(0x0002));
        let d = mesh.on_frame(&frame.encode(), GroupMask::ALL, true, 0, &mut rng);
        assert_eq!(d, Disposition::NotForUs);
        assert!(mesh.pending().is_some());
    }

    #[test]
    fn test_no_rebroadcast_flag() {
        let mut mesh = engine();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let frame = effect(1, 2).with_flags(FrameFlags::NO_REBROADCAST);
        let d = mesh.on_frame(&frame.encode(), GroupMask::ALL, true, 0, &mut rng);
        assert!(matches!(d, Disposition::Deliver(_)));
        assert!(mesh.pending().is_none());
        assert_eq!(mesh.stats().suppressed_flag, 1);
    }

    #[test]
    fn test_relay_disabled() {
        let mut mesh = engine();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        mesh.on_frame(&effect(1, 2).encode(), GroupMask::ALL, false, 0, &mut rng);
        assert!(mesh.pending().is_none());
        assert_eq!(mesh.stats().suppressed_disabled, 1);
    }

    #[test]
    fn test_busy_and_gap_suppression() {
        let mut mesh = engine();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        mesh.on_frame(&effect(1, 2).encode(), GroupMask::ALL, true, 0, &mut rng);
        mesh.on_frame(&effect(2, 2).encode(), GroupMask::ALL, true, 1, &mut rng);
        assert_eq!(mesh.stats().suppressed_busy, 1);

        let sent_at = mesh.pending().unwrap().due_at;
        assert!(mesh.poll_rebroadcast(sent_at).is_some());
        mesh.on_frame(&effect(3, 2).encode(), GroupMask::ALL, true, sent_at + 5, &mut rng);
        assert_eq!(mesh.stats().suppressed_gap, 1);
        mesh.on_frame(&effect(4, 2).encode(), GroupMask::ALL, true, sent_at + 20, &mut rng);
        assert!(mesh.pending().is_some());
    }

    #[test]
    fn test_poll_waits_for_jitter() {
        let mut mesh = engine();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        mesh.on_frame(&effect(1, 2).encode(), GroupMask::ALL, true, 100, &mut rng);
        let due = mesh.pending().unwrap().due_at;
        if due > 100 {
            assert!(mesh.poll_rebroadcast(due - 1).is_none());
        }
        assert!(mesh.poll_rebroadcast(due).is_some());
        assert!(mesh.pending().is_none());
        assert_eq!(mesh.stats().rebroadcast_sent, 1);
    }

    #[test]
    fn test_pairing_frame_is_recorded_not_flooded() {
        let mut mesh = engine();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let frame = CommandFrame::new(Opcode::Pairing(PairingOp::ConfigSet))
            .with_sequence(40)
            .with_ttl(3);
        let d = mesh.on_frame(&frame.encode(), GroupMask::ALL, true, 0, &mut rng);
        assert_eq!(d, Disposition::PairingFrame);
        assert!(mesh.pending().is_none());
        assert!(mesh.has_seen(40));
    }
}
