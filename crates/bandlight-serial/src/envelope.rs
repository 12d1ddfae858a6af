//! Host-to-bridge envelope.
//!
//! Every command frame the host sends over the wire is wrapped as:
//!
//! ```text
//! +------+----------------------+----------+
//! | 0xAA | payload (16 bytes)   | crc8     |
//! +------+----------------------+----------+
//! ```
//!
//! The CRC covers the payload only. The decoder is a two-state machine fed
//! one byte at a time; a gap between bytes longer than
//! [`ENVELOPE_TIMEOUT_MS`] while a frame is in flight drops the partial frame
//! and resynchronises on the next start byte.

use bandlight_frame::{crc8, FRAME_SIZE};

use crate::{SerialError, SerialResult};

/// Start-of-frame marker for host-to-bridge envelopes.
pub const ENVELOPE_START: u8 = 0xAA;

/// Total length of an encoded envelope.
pub const ENVELOPE_SIZE: usize = FRAME_SIZE + 2;

/// Longest tolerated gap between bytes of one envelope.
pub const ENVELOPE_TIMEOUT_MS: u64 = 100;

/// Wrap a command frame in the wired envelope.
pub fn encode_envelope(payload: &[u8; FRAME_SIZE]) -> [u8; ENVELOPE_SIZE] {
    let mut out = [0u8; ENVELOPE_SIZE];
    out[0] = ENVELOPE_START;
    out[1..=FRAME_SIZE].copy_from_slice(payload);
    out[ENVELOPE_SIZE - 1] = crc8(payload);
    out
}

/// Decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    WaitingForStart,
    /// Collecting payload and checksum; holds the number of bytes received
    /// after the start byte.
    Receiving(usize),
}

/// Counters kept by [`EnvelopeDecoder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvelopeStats {
    pub frames: u64,
    pub checksum_errors: u64,
    pub timeouts: u64,
    pub skipped_bytes: u64,
}

/// Byte-at-a-time envelope decoder.
#[derive(Debug)]
pub struct EnvelopeDecoder {
    state: DecoderState,
    /// Payload followed by the checksum byte.
    buffer: [u8; FRAME_SIZE + 1],
    last_byte_at: u64,
    stats: EnvelopeStats,
}

impl Default for EnvelopeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeDecoder {
    pub fn new() -> Self {
        EnvelopeDecoder {
            state: DecoderState::WaitingForStart,
            buffer: [0u8; FRAME_SIZE + 1],
            last_byte_at: 0,
            stats: EnvelopeStats::default(),
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn stats(&self) -> EnvelopeStats {
        self.stats
    }

    /// Drop a partial frame if the line has been quiet for too long.
    ///
    /// Returns `true` if a resync happened.
    pub fn poll_timeout(&mut self, now_ms: u64) -> bool {
        if let DecoderState::Receiving(received) = self.state {
            if now_ms.saturating_sub(self.last_byte_at) > ENVELOPE_TIMEOUT_MS {
                log::debug!("Envelope timeout after {} bytes, resync", received);
                self.stats.timeouts += 1;
                self.state = DecoderState::WaitingForStart;
                return true;
            }
        }
        false
    }

    /// Feed one byte received at `now_ms`.
    ///
    /// Returns `Ok(Some(payload))` when a complete, valid frame has been
    /// assembled, `Ok(None)` while more bytes are needed, and an error when
    /// a complete frame failed its checksum.
    pub fn feed(&mut self, byte: u8, now_ms: u64) -> SerialResult<Option<[u8; FRAME_SIZE]>> {
        self.poll_timeout(now_ms);
        self.last_byte_at = now_ms;

        match self.state {
            DecoderState::WaitingForStart => {
                if byte == ENVELOPE_START {
                    self.state = DecoderState::Receiving(0);
                } else {
                    self.stats.skipped_bytes += 1;
                }
                Ok(None)
            }
            DecoderState::Receiving(received) => {
                self.buffer[received] = byte;
                let received = received + 1;
                if received < self.buffer.len() {
                    self.state = DecoderState::Receiving(received);
                    return Ok(None);
                }

                self.state = DecoderState::WaitingForStart;
                let mut payload = [0u8; FRAME_SIZE];
                payload.copy_from_slice(&self.buffer[..FRAME_SIZE]);
                let expected = crc8(&payload);
                let actual = self.buffer[FRAME_SIZE];
                if expected != actual {
                    self.stats.checksum_errors += 1;
                    log::warn!(
                        "Envelope checksum mismatch: expected 0x{:02X}, got 0x{:02X}",
                        expected,
                        actual
                    );
                    return Err(SerialError::ChecksumMismatch { expected, actual });
                }
                self.stats.frames += 1;
                Ok(Some(payload))
            }
        }
    }

    /// Feed a chunk of bytes all received at `now_ms`, collecting every
    /// valid frame. Checksum failures are counted and skipped.
    pub fn feed_all(&mut self, data: &[u8], now_ms: u64) -> Vec<[u8; FRAME_SIZE]> {
        data.iter()
            .filter_map(|&byte| self.feed(byte, now_ms).ok().flatten())
            .collect()
    }

    pub fn reset(&mut self) {
        self.state = DecoderState::WaitingForStart;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> [u8; FRAME_SIZE] {
        let mut p = [0u8; FRAME_SIZE];
        for (i, b) in p.iter_mut().enumerate() {
            *b = i as u8 * 3;
        }
        p
    }

    #[test]
    fn test_encode_layout() {
        let p = payload();
        let env = encode_envelope(&p);
        assert_eq!(env[0], 0xAA);
        assert_eq!(&env[1..17], &p);
        assert_eq!(env[17], crc8(&p));
    }

    #[test]
    fn test_decode_valid_frame() {
        let mut dec = EnvelopeDecoder::new();
        let frames = dec.feed_all(&encode_envelope(&payload()), 0);
        assert_eq!(frames, vec![payload()]);
        assert_eq!(dec.stats().frames, 1);
        assert_eq!(dec.state(), DecoderState::WaitingForStart);
    }

    #[test]
    fn test_checksum_mismatch_discards_frame() {
        let mut dec = EnvelopeDecoder::new();
        let mut env = encode_envelope(&payload());
        env[17] ^= 0xFF;
        let mut result = Ok(None);
        for &b in &env {
            result = dec.feed(b, 0);
        }
        assert!(matches!(result, Err(SerialError::ChecksumMismatch { .. })));
        assert_eq!(dec.stats().checksum_errors, 1);

        // Next good frame still decodes.
        let frames = dec.feed_all(&encode_envelope(&payload()), 1);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_garbage_before_start_is_skipped() {
        let mut dec = EnvelopeDecoder::new();
        let mut stream = vec![0x01, 0x02, 0x03];
        stream.extend_from_slice(&encode_envelope(&payload()));
        let frames = dec.feed_all(&stream, 0);
        assert_eq!(frames.len(), 1);
        assert_eq!(dec.stats().skipped_bytes, 3);
    }

    #[test]
    fn test_interbyte_timeout_forces_resync() {
        let mut dec = EnvelopeDecoder::new();
        let env = encode_envelope(&payload());

        // Half a frame, then silence.
        for &b in &env[..8] {
            assert_eq!(dec.feed(b, 1000).unwrap(), None);
        }
        assert_eq!(dec.state(), DecoderState::Receiving(7));

        // A whole new frame arriving later decodes cleanly.
        let frames = dec.feed_all(&env, 1000 + ENVELOPE_TIMEOUT_MS + 1);
        assert_eq!(frames, vec![payload()]);
        assert_eq!(dec.stats().timeouts, 1);
    }

    #[test]
    fn test_poll_timeout() {
        let mut dec = EnvelopeDecoder::new();
        dec.feed(ENVELOPE_START, 10).unwrap();
        assert!(!dec.poll_timeout(10 + ENVELOPE_TIMEOUT_MS));
        assert!(dec.poll_timeout(11 + ENVELOPE_TIMEOUT_MS));
        assert_eq!(dec.state(), DecoderState::WaitingForStart);
    }
}
