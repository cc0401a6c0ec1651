//! Admin handlers
//!
//! Operational visibility and manual controls for the in-memory state:
//! rate-limiter inspection and reset, conversation counts and cleanup.

use actix_web::{web, HttpResponse};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::error::AppError;
use crate::models::{RateLimitQuery, RateLimitResetRequest};
use crate::services::{RateLimiterStats, RemainingRequests};
use crate::AppState;

#[derive(Serialize)]
struct RateLimitStatus {
    stats: RateLimiterStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining: Option<RemainingRequests>,
}

/// GET /v1/admin/rate-limits
///
/// Limiter stats, plus remaining admissions for a specific client when
/// `ip_address` is supplied.
pub async fn get_rate_limits(
    state: web::Data<AppState>,
    query: web::Query<RateLimitQuery>,
) -> Result<HttpResponse, AppError> {
    let stats = state.rate_limiter.stats().await;
    let remaining = match &query.ip_address {
        Some(ip) => Some(
            state
                .rate_limiter
                .remaining(ip, query.api_key.as_deref())
                .await,
        ),
        None => None,
    };

    Ok(HttpResponse::Ok().json(super::ApiResponse::new(RateLimitStatus { stats, remaining })))
}

/// POST /v1/admin/rate-limits/reset
///
/// Clear buckets for the given IP and/or API key; with an empty body, clear
/// everything.
pub async fn reset_rate_limits(
    state: web::Data<AppState>,
    body: web::Json<RateLimitResetRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    info!(
        ip_address = body.ip_address.as_deref(),
        api_key_present = body.api_key.is_some(),
        "Rate limit reset requested"
    );

    state
        .rate_limiter
        .reset(body.ip_address.as_deref(), body.api_key.as_deref())
        .await;

    Ok(HttpResponse::Ok().json(super::ApiResponse::new(json!({ "reset": true }))))
}

/// GET /v1/admin/conversations
pub async fn get_conversations(
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let active = state.conversations.active_count().await;
    Ok(HttpResponse::Ok().json(super::ApiResponse::new(json!({ "active": active }))))
}

/// POST /v1/admin/conversations/cleanup
///
/// Force a sweep of expired conversations without waiting for the
/// maintenance job.
pub async fn cleanup_conversations(
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let removed = state.conversations.cleanup_expired().await;
    Ok(HttpResponse::Ok().json(super::ApiResponse::new(json!({ "removed": removed }))))
}

/// Configure admin routes
pub fn configure_admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .service(web::resource("/rate-limits").route(web::get().to(get_rate_limits)))
            .service(
                web::resource("/rate-limits/reset").route(web::post().to(reset_rate_limits)),
            )
            .service(web::resource("/conversations").route(web::get().to(get_conversations)))
            .service(
                web::resource("/conversations/cleanup")
                    .route(web::post().to(cleanup_conversations)),
            ),
    );
}
