//! # Session Handshake Coordinator
//!
//! Guarantees ordering between session-configuration frames and the
//! upstream's readiness signal. The upstream accepts a `session.update` only
//! after it has emitted `session.created`; nothing on either connection
//! enforces that on its own, so the relay holds configuration frames in an
//! ordered buffer behind a one-shot latch.
//!
//! The latch replaces delay-and-retry waiting: there are no timers involved,
//! the buffer flushes exactly once on the ready transition, and relative
//! order among buffered frames is preserved.

use std::collections::VecDeque;

/// What the gate decided to do with a submitted frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Forward to upstream immediately
    Forward(String),
    /// Held in the pending buffer until the latch opens
    Held,
}

/// Readiness latch plus ordered pending buffer for one session.
///
/// Owned exclusively by one relay session; never shared across sessions.
#[derive(Debug, Default)]
pub struct HandshakeGate {
    ready: bool,
    pending: VecDeque<String>,
}

impl HandshakeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the upstream has signaled readiness.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Number of frames waiting for the latch to open.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Submit a configuration frame.
    ///
    /// Before readiness the frame is appended to the pending buffer in
    /// arrival order; afterwards it forwards immediately.
    pub fn submit(&mut self, frame: String) -> GateOutcome {
        if self.ready {
            GateOutcome::Forward(frame)
        } else {
            self.pending.push_back(frame);
            GateOutcome::Held
        }
    }

    /// Open the latch and flush the pending buffer in arrival order.
    ///
    /// Readiness is a one-time event per session; calling this again returns
    /// an empty flush.
    pub fn open(&mut self) -> Vec<String> {
        if self.ready {
            return Vec::new();
        }
        self.ready = true;
        self.pending.drain(..).collect()
    }

    /// Discard all pending frames without forwarding.
    ///
    /// Called when the session closes before readiness was ever signaled;
    /// the close itself is the terminal signal, so no error is raised.
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holds_frames_until_ready() {
        let mut gate = HandshakeGate::new();

        assert_eq!(gate.submit("update-1".to_string()), GateOutcome::Held);
        assert_eq!(gate.submit("update-2".to_string()), GateOutcome::Held);
        assert!(!gate.is_ready());
        assert_eq!(gate.pending_len(), 2);
    }

    #[test]
    fn test_flush_preserves_arrival_order() {
        let mut gate = HandshakeGate::new();
        for i in 0..5 {
            gate.submit(format!("update-{}", i));
        }

        let flushed = gate.open();
        assert_eq!(
            flushed,
            vec!["update-0", "update-1", "update-2", "update-3", "update-4"]
        );
    }

    #[test]
    fn test_forwards_immediately_after_ready() {
        let mut gate = HandshakeGate::new();
        gate.submit("early".to_string());
        gate.open();

        assert_eq!(
            gate.submit("late".to_string()),
            GateOutcome::Forward("late".to_string())
        );
        assert_eq!(gate.pending_len(), 0);
    }

    #[test]
    fn test_open_is_one_shot() {
        let mut gate = HandshakeGate::new();
        gate.submit("update".to_string());

        assert_eq!(gate.open().len(), 1);
        assert!(gate.open().is_empty());
        assert!(gate.is_ready());
    }

    #[test]
    fn test_discard_before_ready() {
        let mut gate = HandshakeGate::new();
        gate.submit("update-1".to_string());
        gate.submit("update-2".to_string());

        assert_eq!(gate.discard(), 2);
        assert_eq!(gate.pending_len(), 0);
        // A later open flushes nothing
        assert!(gate.open().is_empty());
    }
}
