//! OpenAI-compatible chat completions adapter
//!
//! Serves OpenAI itself plus every provider exposing the same dialect:
//! Qwen (DashScope compatible mode), Doubao (Ark), GLM, and user-supplied
//! custom endpoints.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{build_client, sse_text_stream, AdapterError, TextStream, VisionAdapter};

const MAX_TOKENS: u32 = 1024;

pub struct OpenAiCompatibleAdapter {
    name: &'static str,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    extra_headers: HashMap<String, String>,
}

impl OpenAiCompatibleAdapter {
    pub fn new(
        name: &'static str,
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
        extra_headers: Option<HashMap<String, String>>,
    ) -> Result<Self, AdapterError> {
        if base_url.is_empty() {
            return Err(AdapterError::InvalidConfig(
                "base_url must not be empty".to_string(),
            ));
        }
        Ok(Self {
            name,
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            extra_headers: extra_headers.unwrap_or_default(),
        })
    }

    fn request(&self, messages: &[Value], stream: bool) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "max_tokens": MAX_TOKENS,
                "stream": stream,
            }));
        for (key, value) in &self.extra_headers {
            req = req.header(key, value);
        }
        req
    }

    async fn send(
        &self,
        messages: &[Value],
        stream: bool,
    ) -> Result<reqwest::Response, AdapterError> {
        let resp = self
            .request(messages, stream)
            .send()
            .await
            .map_err(AdapterError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Api {
                provider: self.name.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl VisionAdapter for OpenAiCompatibleAdapter {
    fn name(&self) -> &str {
        self.name
    }

    async fn generate(&self, messages: &[Value]) -> Result<String, AdapterError> {
        let resp = self.send(messages, false).await?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        debug!(provider = self.name, "Completion received");
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                AdapterError::Parse("response has no choices[0].message.content".to_string())
            })
    }

    async fn generate_stream(&self, messages: &[Value]) -> Result<TextStream, AdapterError> {
        let resp = self.send(messages, true).await?;
        Ok(sse_text_stream(resp, |frame| {
            frame["choices"][0]["delta"]["content"]
                .as_str()
                .map(str::to_string)
        }))
    }

    async fn test_connection(&self) -> Result<(), AdapterError> {
        let resp = self
            .client
            .get(format!("{}/models", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(AdapterError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Api {
                provider: self.name.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_normalized() {
        let adapter = OpenAiCompatibleAdapter::new(
            "openai",
            "https://api.openai.com/v1/",
            "sk-test",
            "gpt-4o",
            Duration::from_secs(5),
            None,
        )
        .unwrap();
        assert_eq!(adapter.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn empty_base_url_is_rejected() {
        assert!(matches!(
            OpenAiCompatibleAdapter::new(
                "custom",
                "",
                "key",
                "model",
                Duration::from_secs(5),
                None
            ),
            Err(AdapterError::InvalidConfig(_))
        ));
    }
}
