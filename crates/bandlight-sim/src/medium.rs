//! Simulated radio medium.
//!
//! Every station owns a [`SimTransport`] that queues what it sends. The
//! simulation drains those queues into the [`Medium`], which fans each
//! transmission out over the station's links, drops copies according to the
//! link's loss probability and delivers the survivors one millisecond later.

use std::collections::{BTreeSet, VecDeque};

use bandlight_common::{RadioTransport, TransportError};
use bandlight_frame::{RadioAddress, FRAME_SIZE};
use bandlight_metrics::{metric_defs, metrics};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::trace;

/// Air time between a send and the matching receive.
pub const MEDIUM_LATENCY_MS: u64 = 1;

/// Peer table size of the radio driver being modelled.
pub const MAX_PEERS: usize = 20;

// ============================================================================
// Transport
// ============================================================================

/// A queued transmission. `dest` is `None` for a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub dest: Option<RadioAddress>,
    pub payload: Vec<u8>,
}

/// [`RadioTransport`] for one simulated station.
#[derive(Debug, Clone)]
pub struct SimTransport {
    address: RadioAddress,
    peers: BTreeSet<RadioAddress>,
    outbox: Vec<Outgoing>,
}

impl SimTransport {
    pub fn new(address: RadioAddress) -> Self {
        SimTransport {
            address,
            peers: BTreeSet::new(),
            outbox: Vec::new(),
        }
    }

    /// Take everything sent since the last call.
    pub fn drain(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    fn check_size(data: &[u8]) -> Result<(), TransportError> {
        if data.len() > FRAME_SIZE {
            return Err(TransportError::PayloadTooLarge {
                size: data.len(),
                max: FRAME_SIZE,
            });
        }
        Ok(())
    }
}

impl RadioTransport for SimTransport {
    fn local_address(&self) -> RadioAddress {
        self.address
    }

    fn send_broadcast(&mut self, data: &[u8]) -> Result<(), TransportError> {
        Self::check_size(data)?;
        self.outbox.push(Outgoing {
            dest: None,
            payload: data.to_vec(),
        });
        Ok(())
    }

    fn send_unicast(&mut self, dest: RadioAddress, data: &[u8]) -> Result<(), TransportError> {
        Self::check_size(data)?;
        if !self.peers.contains(&dest) {
            return Err(TransportError::NotPeer(dest));
        }
        self.outbox.push(Outgoing {
            dest: Some(dest),
            payload: data.to_vec(),
        });
        Ok(())
    }

    fn add_peer(&mut self, addr: RadioAddress) -> Result<(), TransportError> {
        if !self.peers.contains(&addr) && self.peers.len() >= MAX_PEERS {
            return Err(TransportError::PeerTableFull);
        }
        self.peers.insert(addr);
        Ok(())
    }

    fn remove_peer(&mut self, addr: RadioAddress) -> Result<(), TransportError> {
        self.peers.remove(&addr);
        Ok(())
    }
}

// ============================================================================
// Medium
// ============================================================================

/// A transmission arriving at a station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Index of the receiving station.
    pub to: usize,
    pub src: RadioAddress,
    pub payload: Vec<u8>,
    pub at_ms: u64,
}

/// Counters kept by the [`Medium`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MediumStats {
    pub transmissions: u64,
    pub delivered: u64,
    pub dropped: u64,
    /// Unicasts whose destination was not a linked station.
    pub unroutable: u64,
}

/// Lossy broadcast medium over a fixed link graph.
pub struct Medium {
    addresses: Vec<RadioAddress>,
    /// Per station: `(neighbour, loss)`.
    neighbours: Vec<Vec<(usize, f64)>>,
    in_flight: VecDeque<Delivery>,
    rng: ChaCha8Rng,
    stats: MediumStats,
}

impl Medium {
    pub fn new(addresses: Vec<RadioAddress>, rng: ChaCha8Rng) -> Self {
        let neighbours = vec![Vec::new(); addresses.len()];
        Medium {
            addresses,
            neighbours,
            in_flight: VecDeque::new(),
            rng,
            stats: MediumStats::default(),
        }
    }

    /// Connect two stations in both directions.
    pub fn link(&mut self, a: usize, b: usize, loss: f64) {
        self.neighbours[a].push((b, loss));
        self.neighbours[b].push((a, loss));
    }

    pub fn stats(&self) -> MediumStats {
        self.stats
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Put a transmission from station `from` on the air at `now_ms`.
    pub fn transmit(&mut self, from: usize, outgoing: Outgoing, now_ms: u64) {
        self.stats.transmissions += 1;
        let src = self.addresses[from];
        let at_ms = now_ms + MEDIUM_LATENCY_MS;

        let targets: Vec<(usize, f64)> = match outgoing.dest {
            None => self.neighbours[from].clone(),
            Some(dest) => {
                let found = self.neighbours[from]
                    .iter()
                    .copied()
                    .find(|&(to, _)| self.addresses[to] == dest);
                match found {
                    Some(target) => vec![target],
                    None => {
                        trace!("Unicast {} -> {} has no route", src, dest);
                        self.stats.unroutable += 1;
                        return;
                    }
                }
            }
        };

        for (to, loss) in targets {
            if loss > 0.0 && self.rng.gen::<f64>() < loss {
                trace!("Lost {} -> {}", src, self.addresses[to]);
                self.stats.dropped += 1;
                metrics::counter!(metric_defs::SIM_MEDIUM_DROPPED.name).increment(1);
                continue;
            }
            self.in_flight.push_back(Delivery {
                to,
                src,
                payload: outgoing.payload.clone(),
                at_ms,
            });
        }
    }

    /// Remove and return every delivery due at or before `now_ms`, in the
    /// order they were sent.
    pub fn due(&mut self, now_ms: u64) -> Vec<Delivery> {
        let mut due = Vec::new();
        while self.in_flight.front().is_some_and(|d| d.at_ms <= now_ms) {
            if let Some(delivery) = self.in_flight.pop_front() {
                due.push(delivery);
            }
        }
        self.stats.delivered += due.len() as u64;
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn addr(last: u8) -> RadioAddress {
        RadioAddress::new([2, 0, 0, 0, 0, last])
    }

    fn medium() -> Medium {
        let mut medium = Medium::new(vec![addr(0), addr(1), addr(2)], ChaCha8Rng::seed_from_u64(1));
        medium.link(0, 1, 0.0);
        medium.link(1, 2, 0.0);
        medium
    }

    fn broadcast(payload: &[u8]) -> Outgoing {
        Outgoing {
            dest: None,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn test_broadcast_reaches_neighbours_only() {
        let mut medium = medium();
        medium.transmit(1, broadcast(&[1; 16]), 10);
        assert!(medium.due(10).is_empty());

        let due = medium.due(11);
        let receivers: Vec<usize> = due.iter().map(|d| d.to).collect();
        assert_eq!(receivers, vec![0, 2]);
        assert!(due.iter().all(|d| d.src == addr(1)));

        medium.transmit(0, broadcast(&[2; 16]), 20);
        let due = medium.due(21);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].to, 1);
    }

    #[test]
    fn test_unicast_needs_a_link() {
        let mut medium = medium();
        medium.transmit(
            0,
            Outgoing {
                dest: Some(addr(1)),
                payload: vec![0x83, 1],
            },
            0,
        );
        medium.transmit(
            0,
            Outgoing {
                dest: Some(addr(2)),
                payload: vec![0x83, 1],
            },
            0,
        );
        let due = medium.due(1);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].to, 1);
        assert_eq!(medium.stats().unroutable, 1);
    }

    #[test]
    fn test_total_loss() {
        let mut medium = Medium::new(vec![addr(0), addr(1)], ChaCha8Rng::seed_from_u64(1));
        medium.link(0, 1, 1.0);
        medium.transmit(0, broadcast(&[0; 16]), 0);
        assert!(medium.due(5).is_empty());
        assert_eq!(medium.stats().dropped, 1);
    }

    #[test]
    fn test_transport_unicast_requires_peer() {
        let mut transport = SimTransport::new(addr(0));
        assert_eq!(
            transport.send_unicast(addr(1), &[0x81]),
            Err(TransportError::NotPeer(addr(1)))
        );
        transport.add_peer(addr(1)).unwrap();
        transport.send_unicast(addr(1), &[0x81]).unwrap();
        transport.remove_peer(addr(1)).unwrap();
        assert_eq!(transport.peer_count(), 0);
        assert_eq!(transport.drain().len(), 1);
    }

    #[test]
    fn test_transport_rejects_oversized_payload() {
        let mut transport = SimTransport::new(addr(0));
        assert!(matches!(
            transport.send_broadcast(&[0; 17]),
            Err(TransportError::PayloadTooLarge { size: 17, .. })
        ));
    }
}
