//! Google Gemini generateContent adapter

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{build_client, sse_text_stream, AdapterError, TextStream, VisionAdapter};

const MAX_OUTPUT_TOKENS: u32 = 1024;

pub struct GeminiAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiAdapter {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// Gemini carries the system prompt in a dedicated systemInstruction
    /// field; split role=system entries out of the contents array.
    fn split_system(messages: &[Value]) -> (Option<Value>, Vec<Value>) {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();
        for msg in messages {
            if msg["role"] == "system" {
                if let Some(parts) = msg["parts"].as_array() {
                    system_parts.extend(parts.iter().cloned());
                }
            } else {
                contents.push(msg.clone());
            }
        }
        let instruction =
            (!system_parts.is_empty()).then(|| json!({ "parts": system_parts }));
        (instruction, contents)
    }

    fn body(&self, messages: &[Value]) -> Value {
        let (instruction, contents) = Self::split_system(messages);
        let mut body = json!({
            "contents": contents,
            "generationConfig": { "maxOutputTokens": MAX_OUTPUT_TOKENS },
        });
        if let Some(instruction) = instruction {
            body["systemInstruction"] = instruction;
        }
        body
    }

    /// All text parts of the first candidate, concatenated.
    fn extract_text(frame: &Value) -> Option<String> {
        let parts = frame["candidates"][0]["content"]["parts"].as_array()?;
        let text: String = parts
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

#[async_trait]
impl VisionAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, messages: &[Value]) -> Result<String, AdapterError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let resp = self
            .client
            .post(url)
            .json(&self.body(messages))
            .send()
            .await
            .map_err(AdapterError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Api {
                provider: "gemini".to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        debug!(provider = "gemini", "Completion received");
        Self::extract_text(&body).ok_or_else(|| {
            AdapterError::Parse("response has no candidates[0].content.parts".to_string())
        })
    }

    async fn generate_stream(&self, messages: &[Value]) -> Result<TextStream, AdapterError> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, self.model, self.api_key
        );
        let resp = self
            .client
            .post(url)
            .json(&self.body(messages))
            .send()
            .await
            .map_err(AdapterError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Api {
                provider: "gemini".to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(sse_text_stream(resp, Self::extract_text))
    }

    async fn test_connection(&self) -> Result<(), AdapterError> {
        let url = format!("{}/models?key={}", self.base_url, self.api_key);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(AdapterError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Api {
                provider: "gemini".to_string(),
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
    fn system_entry_becomes_instruction() {
        let messages = vec![
            json!({ "role": "system", "parts": [{ "text": "be brief" }] }),
            json!({ "role": "user", "parts": [{ "text": "hello" }] }),
        ];

        let (instruction, contents) = GeminiAdapter::split_system(&messages);
        assert_eq!(instruction.unwrap()["parts"][0]["text"], "be brief");
        assert_eq!(contents.len(), 1);
    }

    #[test]
    fn extract_concatenates_text_parts() {
        let frame = json!({
            "candidates": [{
                "content": {
                    "parts": [{ "text": "hel" }, { "text": "lo" }],
                }
            }]
        });
        assert_eq!(GeminiAdapter::extract_text(&frame).unwrap(), "hello");
    }

    #[test]
    fn extract_skips_frames_without_text() {
        let frame = json!({ "candidates": [{ "finishReason": "STOP" }] });
        assert!(GeminiAdapter::extract_text(&frame).is_none());
    }
}
