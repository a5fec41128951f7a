//! Configuration settings for Tipster.

use crate::usage::FREE_TIER_QUOTA;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub transcript: TranscriptSettings,
    pub extraction: ExtractionSettings,
    pub usage: UsageSettings,
    pub youtube: YoutubeSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.tipster".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP API server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Header carrying the identity established by the surrounding web layer.
    pub identity_header: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            identity_header: "x-user-email".to_string(),
        }
    }
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Path to the SQLite database.
    pub sqlite_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.tipster/tipster.db".to_string(),
        }
    }
}

/// Transcript service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptSettings {
    /// Base URL of the transcript service (`GET {base_url}/transcript/{video_id}`).
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for TranscriptSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5005".to_string(),
            timeout_seconds: 60,
        }
    }
}

/// Recommendation extraction (LLM) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Chat model used to extract recommendations.
    pub model: String,
    pub temperature: f32,
    pub max_completion_tokens: u32,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// OpenAI-compatible API base URL (defaults to api.openai.com).
    pub api_base: Option<String>,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_completion_tokens: 8192,
            timeout_seconds: 300,
            api_base: None,
        }
    }
}

/// Usage metering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageSettings {
    /// Analyses a free-tier user may run per calendar month.
    pub free_monthly_quota: u32,
}

impl Default for UsageSettings {
    fn default() -> Self {
        Self {
            free_monthly_quota: FREE_TIER_QUOTA,
        }
    }
}

/// YouTube Data API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeSettings {
    /// YouTube Data API key. Falls back to `YOUTUBE_API_KEY`.
    pub api_key: Option<String>,
    /// Only videos published within this many days count as recent.
    pub recent_window_days: u32,
    /// Videos shorter than this are treated as shorts and skipped.
    pub min_duration_seconds: u64,
    /// Maximum search results requested per channel.
    pub max_results: u32,
}

impl Default for YoutubeSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            recent_window_days: 15,
            min_duration_seconds: 60,
            max_results: 50,
        }
    }
}

impl YoutubeSettings {
    /// Configured API key, or the `YOUTUBE_API_KEY` environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("YOUTUBE_API_KEY").ok().filter(|k| !k.is_empty()))
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::TipsterError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tipster")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.store.sqlite_path)
    }
}
