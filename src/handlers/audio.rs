//! Audio file handler
//!
//! Serves synthesized speech back to the client. Filenames are the opaque
//! ids produced by the audio store; anything else is a 404.

use actix_web::{web, HttpResponse};

use crate::error::AppError;
use crate::AppState;

/// GET /audio/{filename}
pub async fn get_audio(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let filename = path.into_inner();

    let store = state
        .tts
        .as_ref()
        .map(|tts| tts.store())
        .ok_or_else(|| AppError::NotFound("audio storage is not enabled".to_string()))?;

    let file_path = store
        .resolve(&filename)
        .ok_or_else(|| AppError::NotFound(format!("Audio file not found: {filename}")))?;

    let data = std::fs::read(&file_path)
        .map_err(|e| AppError::Internal(format!("failed to read audio file: {e}")))?;

    let content_type = match file_path.extension().and_then(|ext| ext.to_str()) {
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        _ => "audio/mpeg",
    };

    Ok(HttpResponse::Ok().content_type(content_type).body(data))
}

/// Configure audio routes
pub fn configure_audio_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/audio/{filename}").route(web::get().to(get_audio)));
}
