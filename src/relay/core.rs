//! # Relay Session Core
//!
//! The session's protocol logic as an explicit state machine
//! (`Connecting → Active → Closed`), independent of any socket. Inbound
//! events go in, the outbound actions they imply come out; the WebSocket
//! actor and upstream tasks just execute those actions. This keeps every
//! lifecycle and ordering rule testable with plain function calls.
//!
//! ## Transitions:
//! - `Connecting`: client accepted, upstream connection in flight. Client
//!   `session.update` frames buffer in the handshake gate; other client
//!   frames have nowhere to go yet and are dropped with a log.
//! - `Active`: upstream connected. The handshake latch is a sub-state: until
//!   `session.created` arrives, configuration frames keep buffering; the
//!   latch then opens once and flushes in order.
//! - `Closed`: terminal. Reached from anywhere; all further events are
//!   no-ops, which is what makes teardown idempotent.

use crate::config::SessionDefaults;
use crate::error::RelayError;
use crate::relay::handshake::{GateOutcome, HandshakeGate};
use crate::relay::message::{self, Frame, FrameKind};
use crate::relay::queue::PlaybackSink;
use crate::relay::router::MessageRouter;
use tracing::{debug, info, warn};

/// Lifecycle state of one relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Client connected, upstream connection being established
    Connecting,
    /// Both connections up, relaying
    Active,
    /// Torn down; no further forwarding in either direction
    Closed,
}

/// An action the session owner must carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send a frame to the client connection
    ToClient(String),
    /// Send a frame to the upstream connection
    ToUpstream(String),
    /// Tear the session down: close both connections
    Close,
}

/// Protocol state machine for one client↔upstream pairing.
///
/// Owned exclusively by the session's handler context; all methods are
/// synchronous and never block.
pub struct RelayCore {
    state: SessionState,
    gate: HandshakeGate,
    router: MessageRouter,
    defaults: SessionDefaults,
}

impl RelayCore {
    pub fn new(defaults: SessionDefaults) -> Self {
        Self {
            state: SessionState::Connecting,
            gate: HandshakeGate::new(),
            router: MessageRouter::new(),
            defaults,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// The upstream connection came up.
    ///
    /// Synthesizes the default `session.update` and submits it through the
    /// handshake gate, so it flushes first — before any buffered client
    /// configuration, which therefore supersedes it.
    pub fn on_upstream_connected(&mut self) -> Vec<Outbound> {
        if self.state != SessionState::Connecting {
            return Vec::new();
        }
        self.state = SessionState::Active;
        info!("Relay session active, awaiting upstream readiness");

        let default_update = message::default_session_update(&self.defaults);
        match self.gate.submit(default_update) {
            GateOutcome::Held => Vec::new(),
            // Readiness can't precede connection; kept for completeness
            GateOutcome::Forward(frame) => vec![Outbound::ToUpstream(frame)],
        }
    }

    /// The upstream connection could not be established, or the credential
    /// is missing.
    ///
    /// Emits exactly one structured error frame to the client, then closes.
    pub fn on_upstream_unavailable(&mut self, error: RelayError) -> Vec<Outbound> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }
        warn!("{}", error);
        let frame = message::error_frame(&error.to_string());
        let mut out = vec![Outbound::ToClient(frame)];
        out.extend(self.teardown(error));
        out
    }

    /// A frame arrived from the client.
    pub fn on_client_frame(&mut self, raw: &str) -> Vec<Outbound> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }

        let frame = Frame::classify(raw);
        if frame.kind == FrameKind::SessionUpdate {
            return match self.gate.submit(frame.raw) {
                GateOutcome::Forward(f) => vec![Outbound::ToUpstream(f)],
                GateOutcome::Held => {
                    debug!(
                        "Buffered client session.update ({} pending)",
                        self.gate.pending_len()
                    );
                    Vec::new()
                }
            };
        }

        match self.state {
            SessionState::Active => vec![Outbound::ToUpstream(frame.raw)],
            SessionState::Connecting => {
                debug!("Dropping client frame, upstream not connected yet");
                Vec::new()
            }
            SessionState::Closed => Vec::new(),
        }
    }

    /// A frame arrived from the upstream.
    pub fn on_upstream_frame(&mut self, raw: &str, sink: &mut dyn PlaybackSink) -> Vec<Outbound> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }

        let frame = Frame::classify(raw);
        let mut out = Vec::new();

        if frame.kind == FrameKind::ErrorFrame {
            let error = RelayError::UpstreamProtocolError(
                frame.error_message().unwrap_or("unknown").to_string(),
            );
            if error.is_fatal() {
                out.push(Outbound::ToClient(frame.raw.clone()));
                out.extend(self.teardown(error));
                return out;
            }
            // Non-fatal: forwarded below, session stays up
        }

        if frame.kind == FrameKind::SessionCreated {
            let flushed = self.gate.open();
            info!(
                "Upstream session ready, flushing {} buffered frame(s)",
                flushed.len()
            );
            out.extend(flushed.into_iter().map(Outbound::ToUpstream));
        }

        out.extend(
            self.router
                .route_upstream(&frame, sink)
                .into_iter()
                .map(Outbound::ToClient),
        );
        out
    }

    /// The client connection closed or errored.
    pub fn on_client_closed(&mut self) -> Vec<Outbound> {
        self.teardown(RelayError::ClientDisconnect)
    }

    /// The upstream connection closed or errored.
    pub fn on_upstream_closed(&mut self) -> Vec<Outbound> {
        self.teardown(RelayError::UpstreamDisconnect)
    }

    /// Full symmetric teardown. Idempotent: a second call from the other
    /// side's closure handler does nothing.
    fn teardown(&mut self, reason: RelayError) -> Vec<Outbound> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }
        self.state = SessionState::Closed;

        let dropped = self.gate.discard();
        if dropped > 0 {
            // Closed before readiness: the close is the terminal signal,
            // pending configuration is discarded without error
            debug!("Discarded {} pending frame(s) on close", dropped);
        }
        self.router.reset();

        info!("Relay session closed: {}", reason);
        vec![Outbound::Close]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::relay::queue::PassthroughPlayback;

    fn core() -> RelayCore {
        RelayCore::new(AppConfig::default().session)
    }

    fn update(n: u32) -> String {
        format!(r#"{{"type":"session.update","session":{{"marker":{}}}}}"#, n)
    }

    const SESSION_CREATED: &str = r#"{"type":"session.created","session":{"id":"s1"}}"#;

    fn upstream_sends(out: &[Outbound]) -> Vec<String> {
        out.iter()
            .filter_map(|o| match o {
                Outbound::ToUpstream(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_no_session_update_reaches_upstream_before_ready() {
        let mut core = core();
        let mut sink = PassthroughPlayback;

        assert!(upstream_sends(&core.on_upstream_connected()).is_empty());
        assert!(upstream_sends(&core.on_client_frame(&update(1))).is_empty());
        assert!(upstream_sends(&core.on_client_frame(&update(2))).is_empty());

        // Non-readiness upstream traffic doesn't open the latch either
        let out = core.on_upstream_frame(r#"{"type":"rate_limits.updated"}"#, &mut sink);
        assert!(upstream_sends(&out).is_empty());
    }

    #[test]
    fn test_handshake_flush_order() {
        let mut core = core();
        let mut sink = PassthroughPlayback;

        core.on_upstream_connected();
        core.on_client_frame(&update(1));
        core.on_client_frame(&update(2));

        let out = core.on_upstream_frame(SESSION_CREATED, &mut sink);
        let sent = upstream_sends(&out);

        // Defaults first, then the client updates in arrival order
        assert_eq!(sent.len(), 3);
        assert!(sent[0].contains("conversation partner"));
        assert_eq!(sent[1], update(1));
        assert_eq!(sent[2], update(2));

        // The readiness frame itself is forwarded to the client
        assert!(out.contains(&Outbound::ToClient(SESSION_CREATED.to_string())));

        // After readiness, updates forward immediately
        let out = core.on_client_frame(&update(3));
        assert_eq!(upstream_sends(&out), vec![update(3)]);
    }

    #[test]
    fn test_transparent_pipe_once_active() {
        let mut core = core();
        core.on_upstream_connected();

        let raw = r#"{"type":"input_audio_buffer.append","audio":"AAAA"}"#;
        let out = core.on_client_frame(raw);
        assert_eq!(out, vec![Outbound::ToUpstream(raw.to_string())]);
    }

    #[test]
    fn test_client_frames_dropped_while_connecting() {
        let mut core = core();
        let out = core.on_client_frame(r#"{"type":"response.create"}"#);
        assert!(out.is_empty());
        assert_eq!(core.state(), SessionState::Connecting);
    }

    #[test]
    fn test_symmetric_close_is_idempotent() {
        let mut core = core();
        core.on_upstream_connected();

        assert_eq!(core.on_client_closed(), vec![Outbound::Close]);
        assert_eq!(core.state(), SessionState::Closed);

        // Second close from the other side's handler: no additional effect
        assert!(core.on_upstream_closed().is_empty());
        assert!(core.on_client_closed().is_empty());
    }

    #[test]
    fn test_close_before_ready_discards_pending_silently() {
        let mut core = core();
        let mut sink = PassthroughPlayback;

        core.on_upstream_connected();
        core.on_client_frame(&update(1));

        let out = core.on_upstream_closed();
        // Teardown only; no error frame for the discarded configuration
        assert_eq!(out, vec![Outbound::Close]);

        // Nothing forwards after close is observed
        assert!(core.on_client_frame(&update(2)).is_empty());
        assert!(core.on_upstream_frame(SESSION_CREATED, &mut sink).is_empty());
    }

    #[test]
    fn test_upstream_unavailable_sends_exactly_one_error_frame() {
        let mut core = core();

        let out = core.on_upstream_unavailable(RelayError::UpstreamUnavailable(
            "OpenAI API key not configured".to_string(),
        ));

        let errors: Vec<_> = out
            .iter()
            .filter(|o| matches!(o, Outbound::ToClient(f) if f.contains("error")))
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(out.contains(&Outbound::Close));
        assert_eq!(core.state(), SessionState::Closed);

        // Reporting is one-time
        assert!(core
            .on_upstream_unavailable(RelayError::UpstreamUnavailable("again".to_string()))
            .is_empty());
    }

    #[test]
    fn test_upstream_error_frame_does_not_close_session() {
        let mut core = core();
        let mut sink = PassthroughPlayback;

        core.on_upstream_connected();
        core.on_upstream_frame(SESSION_CREATED, &mut sink);

        let raw = r#"{"type":"error","error":{"message":"server hiccup"}}"#;
        let out = core.on_upstream_frame(raw, &mut sink);

        assert_eq!(out, vec![Outbound::ToClient(raw.to_string())]);
        assert_eq!(core.state(), SessionState::Active);
    }

    #[test]
    fn test_malformed_audio_delta_does_not_close_session() {
        let mut core = core();
        let mut sink = PassthroughPlayback;

        core.on_upstream_connected();
        core.on_upstream_frame(SESSION_CREATED, &mut sink);

        let raw = r#"{"type":"response.audio.delta","delta":"%%not-base64%%"}"#;
        let out = core.on_upstream_frame(raw, &mut sink);

        // Skipped chunk, forwarded frame, no teardown
        assert_eq!(out, vec![Outbound::ToClient(raw.to_string())]);
        assert_eq!(core.state(), SessionState::Active);
    }

    #[test]
    fn test_audio_and_transcript_flow_through_router() {
        let mut core = core();
        let mut sink = PassthroughPlayback;

        core.on_upstream_connected();
        core.on_upstream_frame(SESSION_CREATED, &mut sink);

        core.on_upstream_frame(
            r#"{"type":"response.audio_transcript.delta","delta":"Good "}"#,
            &mut sink,
        );
        core.on_upstream_frame(
            r#"{"type":"response.audio_transcript.delta","delta":"morning"}"#,
            &mut sink,
        );
        assert_eq!(core.router().transcript().current(), "Good morning");

        core.on_upstream_frame(r#"{"type":"response.audio.done"}"#, &mut sink);
        assert_eq!(
            core.router().transcript().turns(),
            &["Good morning".to_string()]
        );
    }
}
