use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub audio: AudioConfig,
    pub conversation: ConversationConfig,
}

/// Remote inference backend endpoints and timeouts
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend (endpoints are `<base>/transcribe-audio`,
    /// `<base>/chat`, `<base>/chat-with-image`, `<base>/speak`)
    pub base_url: String,

    /// Per-attempt upload timeout in seconds; one retry on timeout
    pub upload_timeout_secs: u64,

    /// Timeout for chat and synthesis requests in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Time budget for WAV re-encoding in milliseconds; past this the raw
    /// captured container is uploaded instead
    pub encode_budget_ms: u64,

    /// Recognizer language hint for the local fallback
    pub language: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Path of the JSON file holding conversation history
    pub store_path: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            upload_timeout_secs: 120,
            request_timeout_secs: 60,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            encode_budget_ms: 3000,
            language: "en-US".to_string(),
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            store_path: "conversations.json".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a file, falling back to defaults when the
    /// file or individual sections are absent
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))
    }
}
