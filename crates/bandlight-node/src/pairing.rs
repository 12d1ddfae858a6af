//! Pairing session bookkeeping.
//!
//! A session starts on a local trigger, broadcasts a request at a fixed
//! interval until the host acknowledges, then waits for the configuration
//! push. The whole exchange must finish within the pairing timeout.

/// State of one pairing attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairingSession {
    pub active: bool,
    pub ack_received: bool,
    pub started_at: u64,
    pub last_request_sent_at: Option<u64>,
}

impl PairingSession {
    /// Begin a new attempt at `now`, discarding any previous one.
    pub fn start(&mut self, now: u64) {
        *self = PairingSession {
            active: true,
            ack_received: false,
            started_at: now,
            last_request_sent_at: None,
        };
    }

    /// Whether a request should go out at `now`.
    pub fn request_due(&self, now: u64, interval_ms: u64) -> bool {
        if !self.active || self.ack_received {
            return false;
        }
        match self.last_request_sent_at {
            None => true,
            Some(sent) => now.saturating_sub(sent) >= interval_ms,
        }
    }

    pub fn mark_request_sent(&mut self, now: u64) {
        self.last_request_sent_at = Some(now);
    }

    /// Record the host's acknowledgement. Returns `false` if no session is
    /// running or the ack was already seen.
    pub fn on_ack(&mut self) -> bool {
        if !self.active || self.ack_received {
            return false;
        }
        self.ack_received = true;
        true
    }

    pub fn timed_out(&self, now: u64, timeout_ms: u64) -> bool {
        self.active && now.saturating_sub(self.started_at) >= timeout_ms
    }

    pub fn finish(&mut self) {
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_schedule() {
        let mut session = PairingSession::default();
        assert!(!session.request_due(0, 2000));

        session.start(1000);
        assert!(session.request_due(1000, 2000));
        session.mark_request_sent(1000);
        assert!(!session.request_due(2999, 2000));
        assert!(session.request_due(3000, 2000));
    }

    #[test]
    fn test_ack_stops_requests() {
        let mut session = PairingSession::default();
        assert!(!session.on_ack());
        session.start(0);
        assert!(session.on_ack());
        assert!(!session.on_ack());
        assert!(!session.request_due(10_000, 2000));
    }

    #[test]
    fn test_timeout() {
        let mut session = PairingSession::default();
        session.start(500);
        assert!(!session.timed_out(15_499, 15_000));
        assert!(session.timed_out(15_500, 15_000));
        session.finish();
        assert!(!session.timed_out(100_000, 15_000));
    }
}
