//! Bridge-to-host status messages.
//!
//! ```text
//! Pairing request (9 bytes):  [0xBB][0x01][address x6][crc8]
//! Config ack (10 bytes):      [0xBB][0x02][address x6][status][crc8]
//! ```
//!
//! The CRC covers every byte after the start byte.

use bandlight_frame::{crc8, RadioAddress};
use bytes::{Buf, BufMut, BytesMut};

use crate::{SerialError, SerialResult};

/// Start-of-frame marker for upstream messages.
pub const UPSTREAM_START: u8 = 0xBB;

/// Message type for a forwarded pairing request.
pub const UPSTREAM_PAIRING_REQUEST: u8 = 0x01;
/// Message type for a forwarded config acknowledgement.
pub const UPSTREAM_CONFIG_ACK: u8 = 0x02;

/// Encoded length of a pairing request message.
pub const UPSTREAM_PAIRING_SIZE: usize = 9;
/// Encoded length of a config ack message.
pub const UPSTREAM_CONFIG_ACK_SIZE: usize = 10;

/// A message relayed from the radio side up to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamMessage {
    PairingRequest { address: RadioAddress },
    ConfigAck { address: RadioAddress, success: bool },
}

impl UpstreamMessage {
    pub fn address(&self) -> RadioAddress {
        match self {
            UpstreamMessage::PairingRequest { address } => *address,
            UpstreamMessage::ConfigAck { address, .. } => *address,
        }
    }

    pub fn type_byte(&self) -> u8 {
        match self {
            UpstreamMessage::PairingRequest { .. } => UPSTREAM_PAIRING_REQUEST,
            UpstreamMessage::ConfigAck { .. } => UPSTREAM_CONFIG_ACK,
        }
    }

    /// Encode with start byte and trailing CRC.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(UPSTREAM_CONFIG_ACK_SIZE);
        buf.put_u8(UPSTREAM_START);
        buf.put_u8(self.type_byte());
        buf.put_slice(self.address().as_bytes());
        if let UpstreamMessage::ConfigAck { success, .. } = self {
            buf.put_u8(u8::from(*success));
        }
        let crc = crc8(&buf[1..]);
        buf.put_u8(crc);
        buf
    }
}

fn frame_size(type_byte: u8) -> Option<usize> {
    match type_byte {
        UPSTREAM_PAIRING_REQUEST => Some(UPSTREAM_PAIRING_SIZE),
        UPSTREAM_CONFIG_ACK => Some(UPSTREAM_CONFIG_ACK_SIZE),
        _ => None,
    }
}

/// Host-side stream decoder for upstream messages.
#[derive(Debug, Default)]
pub struct UpstreamDecoder {
    buffer: BytesMut,
}

impl UpstreamDecoder {
    pub fn new() -> Self {
        UpstreamDecoder {
            buffer: BytesMut::with_capacity(64),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next message.
    ///
    /// Returns `Ok(None)` when more data is needed. A corrupt or unknown
    /// frame consumes its start byte and returns an error; calling again
    /// resumes the scan after it.
    pub fn decode(&mut self) -> SerialResult<Option<UpstreamMessage>> {
        // Skip anything before the start byte.
        while !self.buffer.is_empty() && self.buffer[0] != UPSTREAM_START {
            self.buffer.advance(1);
        }
        if self.buffer.len() < 2 {
            return Ok(None);
        }

        let type_byte = self.buffer[1];
        let Some(size) = frame_size(type_byte) else {
            self.buffer.advance(1);
            return Err(SerialError::UnknownMessageType(type_byte));
        };
        if self.buffer.len() < size {
            return Ok(None);
        }

        let expected = crc8(&self.buffer[1..size - 1]);
        let actual = self.buffer[size - 1];
        if expected != actual {
            log::warn!(
                "Upstream checksum mismatch: expected 0x{:02X}, got 0x{:02X}",
                expected,
                actual
            );
            self.buffer.advance(1);
            return Err(SerialError::ChecksumMismatch { expected, actual });
        }

        let frame = self.buffer.split_to(size);
        let mut address = [0u8; 6];
        address.copy_from_slice(&frame[2..8]);
        let address = RadioAddress::new(address);
        let message = match type_byte {
            UPSTREAM_CONFIG_ACK => UpstreamMessage::ConfigAck {
                address,
                success: frame[8] != 0,
            },
            _ => UpstreamMessage::PairingRequest { address },
        };
        Ok(Some(message))
    }

    /// Decode every complete message currently buffered, skipping corrupt
    /// frames.
    pub fn decode_all(&mut self) -> Vec<UpstreamMessage> {
        let mut out = Vec::new();
        loop {
            match self.decode() {
                Ok(Some(msg)) => out.push(msg),
                Ok(None) => break,
                Err(e) => log::debug!("Skipping upstream frame: {}", e),
            }
        }
        out
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}
