//! # Relay Frame Types
//!
//! Classification of the structured frames exchanged on both sides of a relay
//! session, and synthesis of the frames the relay originates itself (the
//! default `session.update` and outbound error frames).
//!
//! ## Wire format:
//! Every frame is a self-contained JSON payload with a string `type`
//! discriminator. Frame types the relay does not recognize are classified as
//! `Opaque` and forwarded byte-for-byte, so additions to the upstream
//! protocol pass through without a relay upgrade.

use crate::config::SessionDefaults;
use serde_json::{json, Value};

/// The frame kinds the relay understands.
///
/// Each inbound frame maps to exactly one kind; `Opaque` is the catch-all
/// for everything else, including payloads that are not valid JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Client or relay session configuration (`session.update`)
    SessionUpdate,
    /// Upstream readiness signal, one per session (`session.created`)
    SessionCreated,
    /// Chunk of base64-encoded assistant audio (`response.audio.delta`)
    AudioDelta,
    /// End of assistant audio output (`response.audio.done`)
    AudioDone,
    /// Chunk of assistant transcript text (`response.audio_transcript.delta`)
    TranscriptDelta,
    /// User speech detected (`input_audio_buffer.speech_started`)
    SpeechStarted,
    /// User speech ended (`input_audio_buffer.speech_stopped`)
    SpeechStopped,
    /// Upstream error report (`error`)
    ErrorFrame,
    /// Anything else, passed through unmodified
    Opaque,
}

/// One inbound frame: the raw payload (kept verbatim for forwarding) plus its
/// classification and parsed body.
#[derive(Debug, Clone)]
pub struct Frame {
    pub raw: String,
    pub kind: FrameKind,
    payload: Option<Value>,
}

impl Frame {
    /// Classify a raw frame by its `type` discriminator.
    ///
    /// Payloads that fail to parse, or that carry no string `type`, are
    /// classified `Opaque` rather than rejected.
    pub fn classify(raw: &str) -> Self {
        let payload: Option<Value> = serde_json::from_str(raw).ok();

        let kind = match payload
            .as_ref()
            .and_then(|v| v.get("type"))
            .and_then(|t| t.as_str())
        {
            Some("session.update") => FrameKind::SessionUpdate,
            Some("session.created") => FrameKind::SessionCreated,
            Some("response.audio.delta") => FrameKind::AudioDelta,
            Some("response.audio.done") => FrameKind::AudioDone,
            Some("response.audio_transcript.delta") => FrameKind::TranscriptDelta,
            Some("input_audio_buffer.speech_started") => FrameKind::SpeechStarted,
            Some("input_audio_buffer.speech_stopped") => FrameKind::SpeechStopped,
            Some("error") => FrameKind::ErrorFrame,
            _ => FrameKind::Opaque,
        };

        Self {
            raw: raw.to_string(),
            kind,
            payload,
        }
    }

    /// The `delta` field carried by audio and transcript delta frames.
    pub fn delta(&self) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|v| v.get("delta"))
            .and_then(|d| d.as_str())
    }

    /// Human-readable message from an error frame, if present.
    pub fn error_message(&self) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|v| v.get("error"))
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
    }
}

/// Synthesize the default `session.update` frame from server-side defaults.
///
/// Sent once per session after the upstream handshake completes; a
/// client-supplied `session.update` arriving later supersedes it.
pub fn default_session_update(defaults: &SessionDefaults) -> String {
    json!({
        "type": "session.update",
        "session": {
            "modalities": ["text", "audio"],
            "instructions": defaults.instructions,
            "voice": defaults.voice,
            "input_audio_format": defaults.input_audio_format,
            "output_audio_format": defaults.output_audio_format,
            "input_audio_transcription": {
                "model": defaults.transcription_model
            },
            "turn_detection": {
                "type": "server_vad",
                "threshold": defaults.vad_threshold,
                "prefix_padding_ms": defaults.vad_prefix_padding_ms,
                "silence_duration_ms": defaults.vad_silence_duration_ms
            },
            "temperature": defaults.temperature
        }
    })
    .to_string()
}

/// Build an outbound error frame in the wire shape clients expect.
pub fn error_frame(message: &str) -> String {
    json!({
        "type": "error",
        "error": { "message": message }
    })
    .to_string()
}
