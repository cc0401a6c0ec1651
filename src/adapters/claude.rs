//! Anthropic Messages API adapter

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{build_client, sse_text_stream, AdapterError, TextStream, VisionAdapter};

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

pub struct ClaudeAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ClaudeAdapter {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: "https://api.anthropic.com".to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// The Messages API wants the system prompt as a top-level field, not a
    /// message. Split role=system entries out of the array.
    fn split_system(messages: &[Value]) -> (String, Vec<Value>) {
        let mut system = Vec::new();
        let mut rest = Vec::new();
        for msg in messages {
            if msg["role"] == "system" {
                if let Some(text) = msg["content"].as_str() {
                    system.push(text.to_string());
                }
            } else {
                rest.push(msg.clone());
            }
        }
        (system.join("\n\n"), rest)
    }

    async fn send(
        &self,
        messages: &[Value],
        stream: bool,
    ) -> Result<reqwest::Response, AdapterError> {
        let (system, messages) = Self::split_system(messages);
        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&json!({
                "model": self.model,
                "max_tokens": MAX_TOKENS,
                "system": system,
                "messages": messages,
                "stream": stream,
            }))
            .send()
            .await
            .map_err(AdapterError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Api {
                provider: "claude".to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl VisionAdapter for ClaudeAdapter {
    fn name(&self) -> &str {
        "claude"
    }

    async fn generate(&self, messages: &[Value]) -> Result<String, AdapterError> {
        let resp = self.send(messages, false).await?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        debug!(provider = "claude", "Completion received");
        body["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AdapterError::Parse("response has no content[0].text".to_string()))
    }

    async fn generate_stream(&self, messages: &[Value]) -> Result<TextStream, AdapterError> {
        let resp = self.send(messages, true).await?;
        Ok(sse_text_stream(resp, |frame| {
            if frame["type"] == "content_block_delta" {
                frame["delta"]["text"].as_str().map(str::to_string)
            } else {
                None
            }
        }))
    }

    async fn test_connection(&self) -> Result<(), AdapterError> {
        // Minimal one-token request; the Messages API has no listing endpoint
        // that validates credentials.
        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&json!({
                "model": self.model,
                "max_tokens": 1,
                "messages": [{ "role": "user", "content": "ping" }],
            }))
            .send()
            .await
            .map_err(AdapterError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Api {
                provider: "claude".to_string(),
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
    fn system_entries_are_lifted_out() {
        let messages = vec![
            json!({ "role": "system", "content": "be brief" }),
            json!({ "role": "user", "content": "hello" }),
            json!({ "role": "assistant", "content": "hi" }),
        ];

        let (system, rest) = ClaudeAdapter::split_system(&messages);
        assert_eq!(system, "be brief");
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0]["role"], "user");
    }

    #[test]
    fn multiple_system_entries_are_joined() {
        let messages = vec![
            json!({ "role": "system", "content": "one" }),
            json!({ "role": "system", "content": "two" }),
        ];

        let (system, rest) = ClaudeAdapter::split_system(&messages);
        assert_eq!(system, "one\n\ntwo");
        assert!(rest.is_empty());
    }
}
