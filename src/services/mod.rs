//! Service layer modules

pub mod conversation;
pub mod image;
pub mod jobs;
pub mod prompt;
pub mod rate_limiter;
pub mod tts;

pub use conversation::{
    Conversation, ConversationConfig, ConversationError, ConversationService,
};
pub use image::{ImageError, ImagePreprocessor};
pub use jobs::{MaintenanceJob, MaintenanceJobConfig};
pub use prompt::{PromptEngine, PromptTemplate};
pub use rate_limiter::{
    LimitScope, RateLimitConfig, RateLimitError, RateLimiterService, RateLimiterStats,
    RemainingRequests,
};
pub use tts::{AudioStore, TtsEngine, TtsError, TtsProvider};
