//! API response types

use serde::Serialize;

/// Payload of a successful non-streaming chat call.
#[derive(Debug, Clone, Serialize)]
pub struct ChatData {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    pub conversation_id: String,
    pub latency_ms: u64,
}

/// One entry in the model catalogue.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: &'static str,
    pub supports_vision: bool,
    pub supports_streaming: bool,
    pub description: &'static str,
}

/// Payload of a connection probe.
#[derive(Debug, Clone, Serialize)]
pub struct TestConnectionData {
    pub success: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}
