//! Vision Model Adapters
//!
//! One trait in front of every vision-capable chat provider. OpenAI, Qwen,
//! Doubao, GLM and user-supplied custom endpoints all speak the OpenAI chat
//! completions dialect and share one adapter; Claude and Gemini get their own.

pub mod claude;
pub mod gemini;
pub mod openai;

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;
use crate::models::{CustomProviderConfig, Provider};

pub use claude::ClaudeAdapter;
pub use gemini::GeminiAdapter;
pub use openai::OpenAiCompatibleAdapter;

/// Errors that can occur talking to a vision model provider
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Provider not configured: missing API key for {0}")]
    NotConfigured(String),

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error("Provider request timed out")]
    Timeout,

    #[error("Failed to reach provider: {0}")]
    Connection(String),

    #[error("{provider} API error (HTTP {status}): {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Failed to parse provider response: {0}")]
    Parse(String),
}

impl AdapterError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Connection(err.to_string())
        }
    }
}

/// Stream of text fragments from a streaming completion.
pub type TextStream = BoxStream<'static, Result<String, AdapterError>>;

/// Interface every vision model adapter implements.
///
/// Messages arrive already shaped for the provider family by the prompt
/// engine; adapters only wrap them in the request envelope.
#[async_trait]
pub trait VisionAdapter: Send + Sync {
    /// Provider name for logging and error reporting.
    fn name(&self) -> &str;

    /// Run a completion and return the full response text.
    async fn generate(&self, messages: &[Value]) -> Result<String, AdapterError>;

    /// Run a streaming completion, yielding text fragments as they arrive.
    async fn generate_stream(&self, messages: &[Value]) -> Result<TextStream, AdapterError>;

    /// Cheap connectivity and credential check.
    async fn test_connection(&self) -> Result<(), AdapterError>;
}

/// Build the adapter for a provider from application config.
pub fn create_adapter(
    provider: Provider,
    config: &Config,
    custom: Option<&CustomProviderConfig>,
) -> Result<Box<dyn VisionAdapter>, AdapterError> {
    let timeout = Duration::from_secs(config.model_timeout_secs);

    let require_key = |key: &Option<String>| {
        key.clone()
            .ok_or_else(|| AdapterError::NotConfigured(provider.as_str().to_string()))
    };

    let adapter: Box<dyn VisionAdapter> = match provider {
        Provider::Openai => Box::new(OpenAiCompatibleAdapter::new(
            "openai",
            "https://api.openai.com/v1",
            &require_key(&config.openai_api_key)?,
            "gpt-4o",
            timeout,
            None,
        )?),
        Provider::Qwen => Box::new(OpenAiCompatibleAdapter::new(
            "qwen",
            "https://dashscope.aliyuncs.com/compatible-mode/v1",
            &require_key(&config.qwen_api_key)?,
            "qwen-vl-plus",
            timeout,
            None,
        )?),
        Provider::Doubao => Box::new(OpenAiCompatibleAdapter::new(
            "doubao",
            "https://ark.cn-beijing.volces.com/api/v3",
            &require_key(&config.doubao_api_key)?,
            "doubao-1-5-vision-pro-32k",
            timeout,
            None,
        )?),
        Provider::Glm => Box::new(OpenAiCompatibleAdapter::new(
            "glm",
            "https://open.bigmodel.cn/api/paas/v4",
            &require_key(&config.glm_api_key)?,
            "glm-4v",
            timeout,
            None,
        )?),
        Provider::Custom => {
            let custom = custom.ok_or_else(|| {
                AdapterError::InvalidConfig(
                    "custom provider requires a custom_config block".to_string(),
                )
            })?;
            Box::new(OpenAiCompatibleAdapter::new(
                "custom",
                &custom.base_url,
                &custom.api_key,
                &custom.model_name,
                timeout,
                custom.headers.clone(),
            )?)
        }
        Provider::Claude => Box::new(ClaudeAdapter::new(
            &require_key(&config.anthropic_api_key)?,
            "claude-3-5-sonnet-20241022",
            timeout,
        )?),
        Provider::Gemini => Box::new(GeminiAdapter::new(
            &require_key(&config.gemini_api_key)?,
            "gemini-1.5-flash",
            timeout,
        )?),
    };
    Ok(adapter)
}

/// Parse a provider SSE response into a stream of text fragments.
///
/// Frames are `data: <json>` lines; a `[DONE]` sentinel or end of body
/// terminates the stream. `extract` pulls the text fragment out of one
/// parsed frame and returns `None` for frames without text.
pub(crate) fn sse_text_stream(
    resp: reqwest::Response,
    extract: impl Fn(&Value) -> Option<String> + Send + 'static,
) -> TextStream {
    struct State<F> {
        body: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
        buffer: String,
        pending: VecDeque<Result<String, AdapterError>>,
        extract: F,
        done: bool,
    }

    let state = State {
        body: resp.bytes_stream().boxed(),
        buffer: String::new(),
        pending: VecDeque::new(),
        extract,
        done: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }

            match state.body.next().await {
                None => {
                    state.done = true;
                }
                Some(Err(e)) => {
                    state.done = true;
                    state.pending.push_back(Err(AdapterError::from_reqwest(e)));
                }
                Some(Ok(chunk)) => {
                    state.buffer.push_str(&String::from_utf8_lossy(&chunk));
                    while let Some(pos) = state.buffer.find('\n') {
                        let line: String = state.buffer.drain(..=pos).collect();
                        let line = line.trim();
                        let Some(payload) = line.strip_prefix("data:") else {
                            continue;
                        };
                        let payload = payload.trim();
                        if payload == "[DONE]" {
                            state.done = true;
                            break;
                        }
                        match serde_json::from_str::<Value>(payload) {
                            Ok(frame) => {
                                if let Some(text) = (state.extract)(&frame) {
                                    if !text.is_empty() {
                                        state.pending.push_back(Ok(text));
                                    }
                                }
                            }
                            Err(e) => {
                                state.pending.push_back(Err(AdapterError::Parse(format!(
                                    "bad SSE frame: {e}"
                                ))));
                            }
                        }
                    }
                }
            }
        }
    })
    .boxed()
}

/// Shared HTTP client construction for adapters.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, AdapterError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AdapterError::InvalidConfig(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            rate_limit_per_ip: 60,
            rate_limit_per_api_key: 100,
            rate_limit_window_secs: 60,
            rate_limit_cleanup_secs: 300,
            conversation_ttl_secs: 1800,
            max_conversation_turns: 10,
            max_image_bytes: 1024 * 1024,
            image_quality: 85,
            model_timeout_secs: 30,
            tts_timeout_secs: 10,
            tts_provider: None,
            tts_endpoint: None,
            tts_audio_dir: "audio_files".to_string(),
            tts_audio_ttl_secs: 3600,
            maintenance_interval_secs: 300,
            openai_api_key: Some("sk-test".to_string()),
            anthropic_api_key: None,
            gemini_api_key: None,
            doubao_api_key: None,
            qwen_api_key: None,
            glm_api_key: None,
        }
    }

    #[test]
    fn factory_builds_configured_provider() {
        let config = test_config();
        let adapter = create_adapter(Provider::Openai, &config, None).unwrap();
        assert_eq!(adapter.name(), "openai");
    }

    #[test]
    fn factory_rejects_missing_key() {
        let config = test_config();
        assert!(matches!(
            create_adapter(Provider::Claude, &config, None),
            Err(AdapterError::NotConfigured(_))
        ));
    }

    #[test]
    fn factory_requires_custom_config_for_custom_provider() {
        let config = test_config();
        assert!(matches!(
            create_adapter(Provider::Custom, &config, None),
            Err(AdapterError::InvalidConfig(_))
        ));
    }
}
