//! Prompt Engine
//!
//! Built-in persona templates and provider-shaped message assembly. Each
//! provider family expects a different JSON layout for image content, so the
//! engine produces the final message array and adapters send it unchanged.

use serde_json::{json, Value};

use crate::models::{Message, Provider, Role};

/// A reusable system-prompt persona.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub system_prompt: &'static str,
    pub description: &'static str,
}

/// Built-in persona templates.
const BUILTIN_TEMPLATES: &[PromptTemplate] = &[
    PromptTemplate {
        id: "museum_guide",
        name: "Museum Guide",
        system_prompt: "You are a professional museum guide who excels at introducing \
            artworks and historical artifacts in a vivid, engaging way. Explain the \
            history and artistic value of the item in front of the user in approachable \
            language.",
        description: "Knowledgeable, engaging storyteller",
    },
    PromptTemplate {
        id: "science_expert",
        name: "Science Expert",
        system_prompt: "You are a science communicator who explains complex principles \
            in simple terms. Rigorous and accurate, but never dry: spark curiosity about \
            the science behind the item the user shows you.",
        description: "Rigorous, clear, accessible",
    },
    PromptTemplate {
        id: "gentle_companion",
        name: "Gentle Companion",
        system_prompt: "You are a warm, considerate companion. Listen, describe what you \
            see with kindness, and always find the positive angle.",
        description: "Warm, considerate, encouraging",
    },
];

/// Prompt Engine
#[derive(Debug, Clone, Default)]
pub struct PromptEngine;

impl PromptEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn get_template(&self, template_id: &str) -> Option<&'static PromptTemplate> {
        BUILTIN_TEMPLATES.iter().find(|t| t.id == template_id)
    }

    pub fn list_templates(&self) -> &'static [PromptTemplate] {
        BUILTIN_TEMPLATES
    }

    /// Assemble the provider-shaped message array: system prompt, prior
    /// turns, then the current image.
    pub fn build_messages(
        &self,
        system_prompt: &str,
        history: &[Message],
        image_base64: &str,
        provider: Provider,
    ) -> Vec<Value> {
        match provider {
            Provider::Gemini => self.build_gemini(system_prompt, history, image_base64),
            Provider::Claude => self.build_claude(system_prompt, history, image_base64),
            // OpenAI and the OpenAI-compatible providers share one shape.
            _ => self.build_openai(system_prompt, history, image_base64),
        }
    }

    fn build_openai(&self, system_prompt: &str, history: &[Message], image_base64: &str) -> Vec<Value> {
        let mut messages = vec![json!({
            "role": "system",
            "content": system_prompt,
        })];

        for msg in history {
            if msg.role != Role::System {
                messages.push(json!({
                    "role": msg.role.as_str(),
                    "content": msg.content,
                }));
            }
        }

        messages.push(json!({
            "role": "user",
            "content": [{
                "type": "image_url",
                "image_url": {
                    "url": format!("data:image/jpeg;base64,{image_base64}"),
                }
            }],
        }));
        messages
    }

    fn build_claude(&self, system_prompt: &str, history: &[Message], image_base64: &str) -> Vec<Value> {
        // The adapter lifts role=system entries into the top-level system
        // field required by the Messages API.
        let mut messages = vec![json!({
            "role": "system",
            "content": system_prompt,
        })];

        for msg in history {
            if msg.role != Role::System {
                messages.push(json!({
                    "role": msg.role.as_str(),
                    "content": msg.content,
                }));
            }
        }

        messages.push(json!({
            "role": "user",
            "content": [{
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": "image/jpeg",
                    "data": image_base64,
                }
            }],
        }));
        messages
    }

    fn build_gemini(&self, system_prompt: &str, history: &[Message], image_base64: &str) -> Vec<Value> {
        // Gemini contents use role user/model and a parts array; the system
        // entry becomes systemInstruction in the adapter.
        let mut messages = vec![json!({
            "role": "system",
            "parts": [{ "text": system_prompt }],
        })];

        for msg in history {
            let role = match msg.role {
                Role::Assistant => "model",
                Role::User => "user",
                Role::System => continue,
            };
            messages.push(json!({
                "role": role,
                "parts": [{ "text": msg.content }],
            }));
        }

        messages.push(json!({
            "role": "user",
            "parts": [{
                "inline_data": {
                    "mime_type": "image/jpeg",
                    "data": image_base64,
                }
            }],
        }));
        messages
    }
}
