use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Maximum requests per IP per window (default: 60)
    pub rate_limit_per_ip: u32,
    /// Maximum requests per API key per window (default: 100)
    pub rate_limit_per_api_key: u32,
    /// Sliding window width in seconds (default: 60)
    pub rate_limit_window_secs: u64,
    /// Rate limiter cleanup interval in seconds (default: 300)
    pub rate_limit_cleanup_secs: u64,
    /// Conversation idle TTL in seconds (default: 1800)
    pub conversation_ttl_secs: u64,
    /// Maximum retained conversation turns (default: 10)
    pub max_conversation_turns: usize,
    /// Maximum re-encoded image size in bytes (default: 1 MiB)
    pub max_image_bytes: usize,
    /// Initial JPEG quality for image re-encoding, 1-100 (default: 85)
    pub image_quality: u8,
    /// Vision model request timeout in seconds (default: 30)
    pub model_timeout_secs: u64,
    /// TTS request timeout in seconds (default: 10)
    pub tts_timeout_secs: u64,
    /// TTS provider identifier ("openai" or "self-hosted"); unset disables TTS
    pub tts_provider: Option<String>,
    /// Endpoint for a self-hosted TTS service
    pub tts_endpoint: Option<String>,
    /// Directory for synthesized audio files (default: "audio_files")
    pub tts_audio_dir: String,
    /// Seconds before a stored audio file is swept (default: 3600)
    pub tts_audio_ttl_secs: u64,
    /// Maintenance sweep interval in seconds (default: 300)
    pub maintenance_interval_secs: u64,

    // Provider credentials; a provider without its key rejects requests.
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub doubao_api_key: Option<String>,
    pub qwen_api_key: Option<String>,
    pub glm_api_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parse_var("PORT", "8080")?;
        let rate_limit_per_ip = parse_var("RATE_LIMIT_PER_IP", "60")?;
        let rate_limit_per_api_key = parse_var("RATE_LIMIT_PER_API_KEY", "100")?;
        let rate_limit_window_secs = parse_var("RATE_LIMIT_WINDOW_SECS", "60")?;
        let rate_limit_cleanup_secs = parse_var("RATE_LIMIT_CLEANUP_SECS", "300")?;
        let conversation_ttl_secs = parse_var("CONVERSATION_TTL_SECS", "1800")?;
        let max_conversation_turns = parse_var("MAX_CONVERSATION_TURNS", "10")?;
        let max_image_bytes = parse_var("MAX_IMAGE_BYTES", "1048576")?;
        let image_quality = parse_var("IMAGE_QUALITY", "85")?;
        let model_timeout_secs = parse_var("MODEL_TIMEOUT_SECS", "30")?;
        let tts_timeout_secs = parse_var("TTS_TIMEOUT_SECS", "10")?;
        let tts_audio_ttl_secs = parse_var("TTS_AUDIO_TTL_SECS", "3600")?;
        let maintenance_interval_secs = parse_var("MAINTENANCE_INTERVAL_SECS", "300")?;

        let tts_audio_dir =
            env::var("TTS_AUDIO_DIR").unwrap_or_else(|_| "audio_files".to_string());

        Ok(Self {
            host,
            port,
            rate_limit_per_ip,
            rate_limit_per_api_key,
            rate_limit_window_secs,
            rate_limit_cleanup_secs,
            conversation_ttl_secs,
            max_conversation_turns,
            max_image_bytes,
            image_quality,
            model_timeout_secs,
            tts_timeout_secs,
            tts_provider: env::var("TTS_PROVIDER").ok(),
            tts_endpoint: env::var("TTS_ENDPOINT").ok(),
            tts_audio_dir,
            tts_audio_ttl_secs,
            maintenance_interval_secs,
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            gemini_api_key: env::var("GEMINI_API_KEY").ok(),
            doubao_api_key: env::var("DOUBAO_API_KEY").ok(),
            qwen_api_key: env::var("QWEN_API_KEY").ok(),
            glm_api_key: env::var("GLM_API_KEY").ok(),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
