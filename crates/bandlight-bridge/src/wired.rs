//! The bridge's side of the wired link to the host.

use thiserror::Error;

/// Errors writing to the wired link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WiredError {
    #[error("wired link closed")]
    Closed,

    #[error("wired write failed: {0}")]
    Write(String),
}

/// Byte sink toward the host.
///
/// Bytes from the host are pushed into the bridge with
/// [`Bridge::feed_wired`](crate::Bridge::feed_wired); this trait only covers
/// the upstream direction.
pub trait WiredLink {
    fn send_upstream(&mut self, data: &[u8]) -> Result<(), WiredError>;
}

/// In-memory wired link. Upstream bytes accumulate until taken.
#[derive(Debug, Clone, Default)]
pub struct BufferedWiredLink {
    upstream: Vec<u8>,
    closed: bool,
}

impl BufferedWiredLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything written upstream so far.
    pub fn take_upstream(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.upstream)
    }

    pub fn pending_len(&self) -> usize {
        self.upstream.len()
    }

    /// Make every later write fail, as if the cable were pulled.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl WiredLink for BufferedWiredLink {
    fn send_upstream(&mut self, data: &[u8]) -> Result<(), WiredError> {
        if self.closed {
            return Err(WiredError::Closed);
        }
        self.upstream.extend_from_slice(data);
        Ok(())
    }
}
