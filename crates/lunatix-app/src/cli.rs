//! CLI argument definitions for the LunatiX assistant.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// LunatiX: chat with the claims assistant by typing or speaking.
#[derive(Parser, Debug)]
#[command(name = "lunatix", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Base URL of the claims API server.
    #[arg(short = 'b', long = "backend-url")]
    pub backend_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Replay utterances from this file (one per line) as recognized speech.
    #[arg(long = "voice-script")]
    pub voice_script: Option<PathBuf>,

    /// Utterances per recognition session before the scripted recognizer
    /// ends the session on its own.
    #[arg(long = "utterances-per-session")]
    pub utterances_per_session: Option<usize>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > LUNATIX_CONFIG env var > ~/.lunatix/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_with(std::env::var("LUNATIX_CONFIG").ok())
    }

    fn resolve_config_path_with(&self, env_value: Option<String>) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = env_value {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the backend URL override.
    ///
    /// Priority: --backend-url flag > LUNATIX_BACKEND_URL env var.
    /// Returns `None` if neither is set (use the config value).
    pub fn resolve_backend_url(&self) -> Option<String> {
        self.resolve_backend_url_with(std::env::var("LUNATIX_BACKEND_URL").ok())
    }

    fn resolve_backend_url_with(&self, env_value: Option<String>) -> Option<String> {
        self.backend_url
            .clone()
            .or(env_value)
            .filter(|url| !url.trim().is_empty())
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Resolve utterances per scripted recognition session.
    pub fn resolve_utterances_per_session(&self, config_value: usize) -> usize {
        self.utterances_per_session.unwrap_or(config_value).max(1)
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".lunatix").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".lunatix").join("config.toml");
    }
    PathBuf::from("config.toml")
}
