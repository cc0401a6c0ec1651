use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

use crate::services::{ConversationError, RateLimitError};

/// Application-level error type
#[derive(Debug)]
pub enum AppError {
    /// Request validation error
    Validation(String),
    /// Not found error
    NotFound(String),
    /// Rate limit exceeded for an identifier class
    RateLimited {
        scope: &'static str,
        limit: u32,
        retry_after: u64,
    },
    /// Upstream model or TTS provider failure
    Upstream(String),
    /// Internal server error
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
    meta: ErrorMeta,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Serialize)]
struct ErrorMeta {
    request_id: String,
}

impl AppError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "Validation error: {msg}"),
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::RateLimited {
                scope,
                limit,
                retry_after,
            } => write!(
                f,
                "Rate limit exceeded for {scope}: maximum {limit} requests per window, retry after {retry_after} seconds"
            ),
            Self::Upstream(msg) => write!(f, "Upstream error: {msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            error: ErrorBody {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
            meta: ErrorMeta {
                request_id: uuid::Uuid::new_v4().to_string(),
            },
        };

        match self {
            Self::Validation(_) => HttpResponse::BadRequest().json(error_response),
            Self::NotFound(_) => HttpResponse::NotFound().json(error_response),
            Self::RateLimited { retry_after, .. } => HttpResponse::TooManyRequests()
                .insert_header(("Retry-After", retry_after.to_string()))
                .json(error_response),
            Self::Upstream(_) => HttpResponse::BadGateway().json(error_response),
            Self::Internal(_) => HttpResponse::InternalServerError().json(error_response),
        }
    }
}

impl From<RateLimitError> for AppError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::Limited {
                scope,
                limit,
                retry_after,
                ..
            } => Self::RateLimited {
                scope: match scope {
                    crate::services::LimitScope::Ip => "IP",
                    crate::services::LimitScope::ApiKey => "API key",
                },
                limit,
                retry_after,
            },
            RateLimitError::InvalidConfig(msg) => Self::Internal(msg),
        }
    }
}

impl From<ConversationError> for AppError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::NotFound(id) => {
                Self::NotFound(format!("Conversation not found: {id}"))
            }
            ConversationError::InvalidConfig(msg) => Self::Internal(msg),
        }
    }
}

impl From<crate::services::ImageError> for AppError {
    fn from(err: crate::services::ImageError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<crate::adapters::AdapterError> for AppError {
    fn from(err: crate::adapters::AdapterError) -> Self {
        use crate::adapters::AdapterError;
        match err {
            AdapterError::NotConfigured(_) | AdapterError::InvalidConfig(_) => {
                Self::Validation(err.to_string())
            }
            _ => Self::Upstream(err.to_string()),
        }
    }
}

impl From<crate::services::TtsError> for AppError {
    fn from(err: crate::services::TtsError) -> Self {
        Self::Upstream(err.to_string())
    }
}
