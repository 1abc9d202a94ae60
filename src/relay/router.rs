//! # Message Router
//!
//! Classifies every upstream frame by its type tag and routes it: audio
//! deltas feed the playback queue, transcript deltas feed the accumulator,
//! everything is forwarded to the client. Once the handshake completes the
//! relay is a transparent pipe; the router adds state, never transformation.
//!
//! Client→upstream routing is simpler and lives in the session core: the
//! only gate is the handshake coordinator.

use crate::error::RelayError;
use crate::relay::message::{Frame, FrameKind};
use crate::relay::queue::{AudioQueue, PlaybackSink};
use crate::relay::transcript::TranscriptAccumulator;
use base64::prelude::*;
use tracing::{debug, warn};

/// Per-session upstream→client router.
///
/// Owns the audio queue, transcript accumulator, and the "assistant
/// speaking" flag. Owned exclusively by one session's handler context.
#[derive(Debug, Default)]
pub struct MessageRouter {
    queue: AudioQueue,
    transcript: TranscriptAccumulator,
    assistant_speaking: bool,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one upstream frame.
    ///
    /// Returns the frames to forward to the client (currently always the
    /// original frame, unmodified). Enqueueing audio is decoupled from
    /// playback completion, so this never blocks.
    pub fn route_upstream(&mut self, frame: &Frame, sink: &mut dyn PlaybackSink) -> Vec<String> {
        match frame.kind {
            FrameKind::AudioDelta => {
                self.assistant_speaking = true;
                match frame.delta() {
                    Some(encoded) => match BASE64_STANDARD.decode(encoded) {
                        Ok(pcm) => self.queue.enqueue(pcm, sink),
                        Err(e) => {
                            // Logged and skipped; the session continues and the
                            // client is not told about the skip
                            warn!(
                                "{}",
                                RelayError::DecodeFailure(format!("invalid base64: {}", e))
                            );
                        }
                    },
                    None => {
                        warn!("{}", RelayError::DecodeFailure("missing delta".to_string()));
                    }
                }
            }
            FrameKind::AudioDone => {
                self.assistant_speaking = false;
                self.transcript.end_turn();
            }
            FrameKind::TranscriptDelta => {
                if let Some(delta) = frame.delta() {
                    let merged = self.transcript.append_delta(delta);
                    debug!("Assistant transcript so far: {} chars", merged.len());
                }
            }
            FrameKind::ErrorFrame => {
                // Forwarded to the client; does not close the session unless
                // the upstream connection itself drops
                warn!(
                    "{}",
                    RelayError::UpstreamProtocolError(
                        frame.error_message().unwrap_or("unknown").to_string()
                    )
                );
            }
            // SpeechStarted / SpeechStopped drive client UI state only;
            // SessionCreated, SessionUpdate and Opaque frames pass through
            _ => {}
        }

        vec![frame.raw.clone()]
    }

    /// Playback subsystem signaled completion of the current chunk.
    pub fn playback_complete(&mut self, sink: &mut dyn PlaybackSink) {
        self.queue.on_playback_complete(sink);
    }

    /// Playback subsystem reported a decode/render failure.
    pub fn playback_failed(&mut self, sink: &mut dyn PlaybackSink) {
        self.queue.on_playback_failed(sink);
    }

    /// Whether the assistant is currently producing audio.
    pub fn assistant_speaking(&self) -> bool {
        self.assistant_speaking
    }

    pub fn queue(&self) -> &AudioQueue {
        &self.queue
    }

    pub fn transcript(&self) -> &TranscriptAccumulator {
        &self.transcript
    }

    /// Drop buffered audio and clear the speaking flag (teardown).
    /// Transcript history stays readable for final logging.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.assistant_speaking = false;
    }
}
