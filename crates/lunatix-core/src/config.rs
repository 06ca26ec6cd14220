use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Assistant reply appended when the chat backend cannot answer.
pub const DEFAULT_FALLBACK_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

/// Top-level configuration for the LunatiX assistant.
///
/// Loaded from `~/.lunatix/config.toml` by default. Every section falls back
/// to its defaults when missing from the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LunatixConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

impl LunatixConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LunatixConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Chat backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Base URL of the claims API server.
    pub backend_url: String,
    /// Versioned API prefix the chatbot routes are mounted under.
    pub api_prefix: String,
    /// Per-request timeout for chat calls.
    pub request_timeout_secs: u64,
    /// Assistant message appended when a chat call fails.
    pub fallback_message: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8000".to_string(),
            api_prefix: "/api/v1".to_string(),
            request_timeout_secs: 30,
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
        }
    }
}

/// Speech recognition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Whether the recognizer should report interim (non-final) results.
    pub interim_results: bool,
    /// Lines replayed per platform session by the scripted recognizer
    /// before it ends the session on its own.
    pub utterances_per_session: usize,
    /// Silence before each scripted utterance, in milliseconds. Zero
    /// delivers a whole platform session at once.
    pub utterance_pause_ms: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            interim_results: true,
            utterances_per_session: 3,
            utterance_pause_ms: 1500,
        }
    }
}
