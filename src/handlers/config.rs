//! Runtime configuration endpoints.
//!
//! `GET /api/v1/config` exposes the current settings; `PUT /api/v1/config`
//! applies a partial update. The upstream credential is excluded from both:
//! reads report only whether one is configured, and update attempts are
//! ignored by `AppConfig::update_from_json`.

use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": {
            "server": {
                "host": config.server.host,
                "port": config.server.port
            },
            "upstream": {
                "url": config.upstream.url,
                "model": config.upstream.model,
                "connect_timeout_secs": config.upstream.connect_timeout_secs,
                "credential_configured": config.upstream.api_key.is_some()
            },
            "session": {
                "voice": config.session.voice,
                "input_audio_format": config.session.input_audio_format,
                "output_audio_format": config.session.output_audio_format,
                "transcription_model": config.session.transcription_model,
                "vad_threshold": config.session.vad_threshold,
                "vad_prefix_padding_ms": config.session.vad_prefix_padding_ms,
                "vad_silence_duration_ms": config.session.vad_silence_duration_ms,
                "temperature": config.session.temperature
            },
            "performance": {
                "max_concurrent_sessions": config.performance.max_concurrent_sessions
            }
        }
    })))
}

pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config
        .update_from_json(&json_str)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state
        .update_config(current_config.clone())
        .map_err(AppError::ValidationError)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": {
            "server": {
                "host": current_config.server.host,
                "port": current_config.server.port
            },
            "upstream": {
                "url": current_config.upstream.url,
                "model": current_config.upstream.model,
                "connect_timeout_secs": current_config.upstream.connect_timeout_secs
            },
            "session": {
                "voice": current_config.session.voice,
                "vad_threshold": current_config.session.vad_threshold,
                "vad_silence_duration_ms": current_config.session.vad_silence_duration_ms,
                "temperature": current_config.session.temperature
            },
            "performance": {
                "max_concurrent_sessions": current_config.performance.max_concurrent_sessions
            }
        }
    })))
}
