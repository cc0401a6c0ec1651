//! Text-to-Speech Service
//!
//! One trait for TTS providers, an OpenAI speech adapter and a self-hosted
//! HTTP adapter behind it, and a disk-backed audio store. Synthesized audio
//! lands under a random filename and is served back via `/audio/{filename}`;
//! stale files are swept by the maintenance job.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Errors that can occur during speech synthesis
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("TTS provider unavailable: {0}")]
    Unavailable(String),

    #[error("Speech generation failed: {0}")]
    Generation(String),

    #[error("Invalid TTS configuration: {0}")]
    InvalidConfig(String),

    #[error("Audio storage error: {0}")]
    Storage(String),
}

/// Synthesized audio plus its container format.
#[derive(Debug, Clone)]
pub struct AudioResult {
    pub data: Vec<u8>,
    /// File extension, e.g. "mp3"
    pub format: String,
}

/// Interface every TTS provider adapter implements.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Convert text to speech.
    async fn synthesize(&self, text: &str, voice: &str, speed: f32)
        -> Result<AudioResult, TtsError>;
}

/// OpenAI speech API adapter.
pub struct OpenAiTts {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiTts {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, TtsError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TtsError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "tts-1".to_string(),
        })
    }
}

#[async_trait]
impl TtsProvider for OpenAiTts {
    fn name(&self) -> &str {
        "openai"
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        speed: f32,
    ) -> Result<AudioResult, TtsError> {
        let voice = if voice == "default" { "alloy" } else { voice };
        let resp = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": self.model,
                "input": text,
                "voice": voice,
                "speed": speed,
                "response_format": "mp3",
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    TtsError::Unavailable(format!("OpenAI TTS: {e}"))
                } else {
                    TtsError::Generation(format!("OpenAI TTS: {e}"))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TtsError::Generation(format!(
                "OpenAI TTS HTTP {status}: {body}"
            )));
        }

        let data = resp
            .bytes()
            .await
            .map_err(|e| TtsError::Generation(e.to_string()))?
            .to_vec();
        Ok(AudioResult {
            data,
            format: "mp3".to_string(),
        })
    }
}

/// Adapter for a self-hosted TTS service exposing `POST /synthesize`.
pub struct SelfHostedTts {
    client: reqwest::Client,
    endpoint: String,
}

impl SelfHostedTts {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, TtsError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TtsError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TtsProvider for SelfHostedTts {
    fn name(&self) -> &str {
        "self-hosted"
    }

    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        speed: f32,
    ) -> Result<AudioResult, TtsError> {
        let resp = self
            .client
            .post(format!("{}/synthesize", self.endpoint))
            .json(&serde_json::json!({
                "text": text,
                "voice": voice,
                "speed": speed,
                "format": "mp3",
            }))
            .send()
            .await
            .map_err(|e| TtsError::Unavailable(format!("self-hosted TTS: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TtsError::Generation(format!(
                "self-hosted TTS HTTP {status}: {body}"
            )));
        }

        let data = resp
            .bytes()
            .await
            .map_err(|e| TtsError::Generation(e.to_string()))?
            .to_vec();
        Ok(AudioResult {
            data,
            format: "mp3".to_string(),
        })
    }
}

/// Disk-backed store for synthesized audio with TTL-based sweeping.
#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
    ttl: Duration,
}

impl AudioStore {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    /// Persist audio bytes under a fresh random filename.
    pub fn save(&self, data: &[u8], format: &str) -> Result<String, TtsError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| TtsError::Storage(e.to_string()))?;
        let filename = format!("{}.{format}", uuid::Uuid::new_v4());
        std::fs::write(self.dir.join(&filename), data)
            .map_err(|e| TtsError::Storage(e.to_string()))?;
        debug!(filename, bytes = data.len(), "Audio file stored");
        Ok(filename)
    }

    /// Resolve a stored filename to its path, rejecting traversal attempts.
    pub fn resolve(&self, filename: &str) -> Option<PathBuf> {
        if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
            return None;
        }
        let path = self.dir.join(filename);
        path.is_file().then_some(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove audio files older than the TTL, returning the removed count.
    pub fn cleanup_expired(&self) -> usize {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let stale = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok())
                .is_some_and(|age| age > self.ttl);
            if stale && std::fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "Stale audio files removed");
        }
        removed
    }
}

/// TTS Engine: picks the configured provider and stores its output.
pub struct TtsEngine {
    provider: Box<dyn TtsProvider>,
    store: AudioStore,
}

impl TtsEngine {
    /// Build from configuration. Returns `Ok(None)` when TTS is not
    /// configured; misconfiguration is an error so startup fails fast.
    pub fn from_config(config: &Config) -> Result<Option<Self>, TtsError> {
        let timeout = Duration::from_secs(config.tts_timeout_secs);
        let provider: Box<dyn TtsProvider> = match config.tts_provider.as_deref() {
            None => return Ok(None),
            Some("openai") => {
                let key = config.openai_api_key.as_deref().ok_or_else(|| {
                    TtsError::InvalidConfig(
                        "TTS_PROVIDER=openai requires OPENAI_API_KEY".to_string(),
                    )
                })?;
                Box::new(OpenAiTts::new(key, timeout)?)
            }
            Some("self-hosted") => {
                let endpoint = config.tts_endpoint.as_deref().ok_or_else(|| {
                    TtsError::InvalidConfig(
                        "TTS_PROVIDER=self-hosted requires TTS_ENDPOINT".to_string(),
                    )
                })?;
                Box::new(SelfHostedTts::new(endpoint, timeout)?)
            }
            Some(other) => {
                return Err(TtsError::InvalidConfig(format!(
                    "Unknown TTS provider: {other}"
                )))
            }
        };

        let store = AudioStore::new(
            config.tts_audio_dir.clone(),
            Duration::from_secs(config.tts_audio_ttl_secs),
        );
        info!(provider = provider.name(), "TTS engine initialized");
        Ok(Some(Self { provider, store }))
    }

    #[cfg(test)]
    pub fn with_provider(provider: Box<dyn TtsProvider>, store: AudioStore) -> Self {
        Self { provider, store }
    }

    /// Synthesize and store audio, returning the URL path to fetch it.
    pub async fn generate(&self, text: &str, voice: &str, speed: f32) -> Result<String, TtsError> {
        let audio = self.provider.synthesize(text, voice, speed).await?;
        let filename = self.store.save(&audio.data, &audio.format)?;
        Ok(format!("/audio/{filename}"))
    }

    /// Try to synthesize, logging instead of failing; TTS is best-effort and
    /// must never break the text response.
    pub async fn try_generate(&self, text: &str, voice: &str, speed: f32) -> Option<String> {
        match self.generate(text, voice, speed).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, "TTS generation failed, returning text only");
                None
            }
        }
    }

    pub fn store(&self) -> &AudioStore {
        &self.store
    }
}
