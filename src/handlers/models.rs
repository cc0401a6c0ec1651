//! Model catalogue and connectivity handlers

use std::time::Instant;

use actix_web::{web, HttpResponse};

use crate::adapters::create_adapter;
use crate::error::AppError;
use crate::models::{ModelInfo, TestConnectionData, TestConnectionRequest};
use crate::AppState;

/// Built-in model catalogue, one entry per supported provider.
const MODEL_CATALOGUE: &[ModelInfo] = &[
    ModelInfo {
        id: "gpt-4o",
        name: "GPT-4o",
        provider: "openai",
        supports_vision: true,
        supports_streaming: true,
        description: "OpenAI's flagship multimodal model",
    },
    ModelInfo {
        id: "claude-3-5-sonnet-20241022",
        name: "Claude 3.5 Sonnet",
        provider: "claude",
        supports_vision: true,
        supports_streaming: true,
        description: "Anthropic's balanced vision-capable model",
    },
    ModelInfo {
        id: "gemini-1.5-flash",
        name: "Gemini 1.5 Flash",
        provider: "gemini",
        supports_vision: true,
        supports_streaming: true,
        description: "Google's fast multimodal model",
    },
    ModelInfo {
        id: "qwen-vl-plus",
        name: "Qwen VL Plus",
        provider: "qwen",
        supports_vision: true,
        supports_streaming: true,
        description: "Alibaba's vision-language model via DashScope",
    },
    ModelInfo {
        id: "doubao-1-5-vision-pro-32k",
        name: "Doubao 1.5 Vision Pro",
        provider: "doubao",
        supports_vision: true,
        supports_streaming: true,
        description: "ByteDance's vision model via Ark",
    },
    ModelInfo {
        id: "glm-4v",
        name: "GLM-4V",
        provider: "glm",
        supports_vision: true,
        supports_streaming: true,
        description: "Zhipu's vision-language model",
    },
];

/// GET /v1/models
///
/// List the built-in model catalogue. Custom endpoints are configured per
/// request and do not appear here.
pub async fn list_models() -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(super::ApiResponse::new(MODEL_CATALOGUE)))
}

/// POST /v1/test-connection
///
/// Probe a provider with the configured credentials. A failed probe is a
/// successful HTTP call with `success: false`; only malformed requests map
/// to error status codes.
pub async fn test_connection(
    state: web::Data<AppState>,
    body: web::Json<TestConnectionRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let started = Instant::now();

    let data = match create_adapter(body.provider, &state.config, body.custom_config.as_ref()) {
        Ok(adapter) => match adapter.test_connection().await {
            Ok(()) => TestConnectionData {
                success: true,
                latency_ms: started.elapsed().as_millis() as u64,
                error_message: None,
            },
            Err(e) => TestConnectionData {
                success: false,
                latency_ms: started.elapsed().as_millis() as u64,
                error_message: Some(e.to_string()),
            },
        },
        Err(e) => TestConnectionData {
            success: false,
            latency_ms: started.elapsed().as_millis() as u64,
            error_message: Some(e.to_string()),
        },
    };

    Ok(HttpResponse::Ok().json(super::ApiResponse::new(data)))
}

/// Configure model routes
pub fn configure_model_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/models").route(web::get().to(list_models)))
        .service(web::resource("/test-connection").route(web::post().to(test_connection)));
}
