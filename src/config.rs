//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_UPSTREAM_MODEL, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)
//!
//! The upstream API credential is special: it is only ever read from the
//! `OPENAI_API_KEY` environment variable, is never written back out through
//! the config endpoints, and is never accepted from a client.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub session: SessionDefaults,
    pub performance: PerformanceConfig,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `host`: IP address or hostname to bind the server to (e.g., "127.0.0.1", "0.0.0.0")
/// - `port`: TCP port number to listen on (1-65535)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Upstream realtime AI endpoint configuration.
///
/// ## Fields:
/// - `url`: Base WebSocket URL of the realtime API
/// - `model`: Realtime model name, appended as a query parameter
/// - `connect_timeout_secs`: Bound on upstream connection establishment
/// - `api_key`: Server-held credential, loaded from `OPENAI_API_KEY` only
///
/// ## Fail-closed behavior:
/// A missing `api_key` does not prevent the server from starting, but every
/// relay session is refused before any network connection is attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub url: String,
    pub model: String,
    pub connect_timeout_secs: u64,
    /// Never serialized into config/health responses.
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
}

impl UpstreamConfig {
    /// Full WebSocket URL including the model query parameter.
    pub fn ws_url(&self) -> String {
        format!("{}?model={}", self.url, self.model)
    }
}

/// Default session configuration sent upstream when a session is established.
///
/// These values synthesize the initial `session.update` frame. A client may
/// send its own `session.update` later, which supersedes this one once the
/// upstream handshake has completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDefaults {
    /// System instructions for the conversation partner
    pub instructions: String,

    /// Voice identity for synthesized speech
    pub voice: String,

    /// Input audio encoding (16-bit PCM)
    pub input_audio_format: String,

    /// Output audio encoding (16-bit PCM)
    pub output_audio_format: String,

    /// Model used for input transcription
    pub transcription_model: String,

    /// Server-side VAD activation threshold (0.0 to 1.0)
    pub vad_threshold: f32,

    /// Audio included before detected speech (milliseconds)
    pub vad_prefix_padding_ms: u32,

    /// Silence required to end a turn (milliseconds)
    pub vad_silence_duration_ms: u32,

    /// Sampling temperature for responses
    pub temperature: f32,
}

/// Performance tuning configuration.
///
/// ## Fields:
/// - `max_concurrent_sessions`: Maximum number of relay sessions to handle simultaneously
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub max_concurrent_sessions: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            upstream: UpstreamConfig {
                url: "wss://api.openai.com/v1/realtime".to_string(),
                model: "gpt-4o-realtime-preview-2024-10-01".to_string(),
                connect_timeout_secs: 10,
                api_key: None,
            },
            session: SessionDefaults {
                instructions: "You are a helpful English conversation partner. \
                    Help users practice their English speaking skills. \
                    Keep responses conversational and engaging."
                    .to_string(),
                voice: "alloy".to_string(),
                input_audio_format: "pcm16".to_string(),
                output_audio_format: "pcm16".to_string(),
                transcription_model: "whisper-1".to_string(),
                vad_threshold: 0.5,
                vad_prefix_padding_ms: 300,
                vad_silence_duration_ms: 1000,
                temperature: 0.8,
            },
            performance: PerformanceConfig {
                max_concurrent_sessions: 50,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases: HOST, PORT, and OPENAI_API_KEY
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Special environment variables used by deployment platforms
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let mut loaded: AppConfig = settings.build()?.try_deserialize()?;

        // The upstream credential bypasses the config layers entirely
        loaded.upstream.api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());

        Ok(loaded)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - Upstream URL uses a WebSocket scheme
    /// - Connect timeout is non-zero
    /// - VAD threshold is within [0.0, 1.0]
    /// - Max concurrent sessions is greater than 0
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if !self.upstream.url.starts_with("wss://") && !self.upstream.url.starts_with("ws://") {
            return Err(anyhow::anyhow!(
                "Upstream URL must use ws:// or wss:// scheme"
            ));
        }

        if self.upstream.connect_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Upstream connect timeout cannot be 0"));
        }

        if !(0.0..=1.0).contains(&self.session.vad_threshold) {
            return Err(anyhow::anyhow!("VAD threshold must be between 0.0 and 1.0"));
        }

        if self.performance.max_concurrent_sessions == 0 {
            return Err(anyhow::anyhow!(
                "Max concurrent sessions must be greater than 0"
            ));
        }

        Ok(())
    }

    /// Update configuration from a JSON string (used for runtime config updates).
    ///
    /// ## Partial updates:
    /// Only the fields present in the JSON are updated. The upstream credential
    /// cannot be changed through this path.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(upstream) = partial_config.get("upstream") {
            if let Some(url) = upstream.get("url").and_then(|v| v.as_str()) {
                self.upstream.url = url.to_string();
            }
            if let Some(model) = upstream.get("model").and_then(|v| v.as_str()) {
                self.upstream.model = model.to_string();
            }
            if let Some(timeout) = upstream.get("connect_timeout_secs").and_then(|v| v.as_u64()) {
                self.upstream.connect_timeout_secs = timeout;
            }
        }

        if let Some(session) = partial_config.get("session") {
            if let Some(instructions) = session.get("instructions").and_then(|v| v.as_str()) {
                self.session.instructions = instructions.to_string();
            }
            if let Some(voice) = session.get("voice").and_then(|v| v.as_str()) {
                self.session.voice = voice.to_string();
            }
            if let Some(threshold) = session.get("vad_threshold").and_then(|v| v.as_f64()) {
                self.session.vad_threshold = threshold as f32;
            }
            if let Some(silence) = session
                .get("vad_silence_duration_ms")
                .and_then(|v| v.as_u64())
            {
                self.session.vad_silence_duration_ms = silence as u32;
            }
            if let Some(temperature) = session.get("temperature").and_then(|v| v.as_f64()) {
                self.session.temperature = temperature as f32;
            }
        }

        if let Some(performance) = partial_config.get("performance") {
            if let Some(sessions) = performance
                .get("max_concurrent_sessions")
                .and_then(|v| v.as_u64())
            {
                self.performance.max_concurrent_sessions = sessions as usize;
            }
        }

        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.session.input_audio_format, "pcm16");
        assert!(config.upstream.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.upstream.url = "https://api.openai.com/v1/realtime".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.session.vad_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_update() {
        let mut config = AppConfig::default();
        let json =
            r#"{"upstream": {"model": "gpt-4o-realtime-preview"}, "session": {"voice": "verse"}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.upstream.model, "gpt-4o-realtime-preview");
        assert_eq!(config.session.voice, "verse");
        // Unrelated fields stay untouched
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_credential_not_updatable_via_json() {
        let mut config = AppConfig::default();
        let json = r#"{"upstream": {"api_key": "client-supplied"}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert!(config.upstream.api_key.is_none());
    }

    #[test]
    fn test_ws_url_includes_model() {
        let config = AppConfig::default();
        let url = config.upstream.ws_url();
        assert!(url.starts_with("wss://api.openai.com/v1/realtime?model="));
    }
}
