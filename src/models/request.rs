//! API request types

use std::collections::HashMap;

use serde::Deserialize;

/// Supported vision model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Openai,
    Gemini,
    Claude,
    Doubao,
    Qwen,
    Glm,
    Custom,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Gemini => "gemini",
            Self::Claude => "claude",
            Self::Doubao => "doubao",
            Self::Qwen => "qwen",
            Self::Glm => "glm",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection details for a provider not in the built-in catalogue.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomProviderConfig {
    /// Base URL of an OpenAI-compatible chat completions API
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

fn default_tts_voice() -> String {
    "default".to_string()
}

fn default_tts_speed() -> f32 {
    1.0
}

/// Body of `POST /api/v1/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// Base64-encoded image, with or without a `data:image/...` prefix
    pub image_base64: String,
    /// System prompt steering the model's persona
    pub system_prompt: String,
    pub provider: Provider,
    /// Required when `provider` is `custom`
    #[serde(default)]
    pub custom_config: Option<CustomProviderConfig>,
    /// Continue an existing conversation instead of starting a new one
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub tts_enabled: bool,
    #[serde(default = "default_tts_voice")]
    pub tts_voice: String,
    #[serde(default = "default_tts_speed")]
    pub tts_speed: f32,
}

/// Body of `POST /api/v1/test-connection`.
#[derive(Debug, Clone, Deserialize)]
pub struct TestConnectionRequest {
    pub provider: Provider,
    #[serde(default)]
    pub custom_config: Option<CustomProviderConfig>,
}

/// Body of `POST /api/v1/admin/rate-limits/reset`.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitResetRequest {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Query of `GET /api/v1/admin/rate-limits`.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitQuery {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}
