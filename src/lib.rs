//! Glimpse - vision chat backend
//!
//! Point a camera at something, pick a persona and a model provider, and get
//! a spoken-or-written description back. This library holds the services,
//! model adapters, and HTTP handlers behind the server binary.

use std::sync::Arc;

pub mod adapters;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::AppError;

pub use services::{
    ConversationService, ImagePreprocessor, MaintenanceJob, MaintenanceJobConfig, PromptEngine,
    RateLimiterService, TtsEngine,
};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub rate_limiter: Arc<RateLimiterService>,
    pub conversations: Arc<ConversationService>,
    pub images: ImagePreprocessor,
    pub prompts: PromptEngine,
    pub tts: Option<Arc<TtsEngine>>,
}
