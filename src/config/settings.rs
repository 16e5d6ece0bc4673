//! Configuration settings for Lekt.

use crate::error::{LektError, Result};
use crate::provider::ProviderKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub context: ContextSettings,
    pub summary: SummarySettings,
    pub storage: StorageSettings,
    pub server: ServerSettings,
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
    /// Speech recognition mode requested from the ingestion collaborator.
    pub asr_mode: AsrMode,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.lekt".to_string(),
            log_level: "warn".to_string(),
            asr_mode: AsrMode::Free,
        }
    }
}

/// Speech recognition mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AsrMode {
    /// Hosted free-tier recognizer (slower, rate limited).
    #[default]
    Free,
    /// Paid low-latency recognizer.
    Fast,
}

impl std::str::FromStr for AsrMode {
    type Err = LektError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(AsrMode::Free),
            "fast" => Ok(AsrMode::Fast),
            _ => Err(LektError::InvalidConfig(format!(
                "Unknown ASR mode '{}' (expected free or fast)",
                s
            ))),
        }
    }
}

impl std::fmt::Display for AsrMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AsrMode::Free => write!(f, "free"),
            AsrMode::Fast => write!(f, "fast"),
        }
    }
}

/// Language model provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Provider identity (nvidia, groq, openai).
    pub provider: ProviderKind,
    /// Model name. Empty means the provider's default model.
    pub model: Option<String>,
    /// Sampling temperature for question answering.
    pub temperature: f32,
    /// Hard cap on generated tokens per call.
    pub max_output_tokens: u32,
    /// Request extended reasoning from providers that support it.
    pub reasoning: bool,
    /// Overall request timeout in seconds.
    pub timeout_seconds: u64,
    /// Override the provider's API base URL (proxies, self-hosted gateways).
    pub base_url: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Nvidia,
            model: None,
            temperature: 0.6,
            max_output_tokens: 2048,
            reasoning: true,
            timeout_seconds: crate::http::DEFAULT_TIMEOUT_SECS,
            base_url: None,
        }
    }
}

impl LlmSettings {
    /// The configured model, falling back to the provider default.
    pub fn model_or_default(&self) -> String {
        self.model
            .as_ref()
            .filter(|m| !m.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }
}

/// Context window bounding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Maximum characters of raw content taken from one session.
    pub session_char_budget: usize,
    /// Maximum characters of context included in one cross-class prompt.
    pub class_char_cap: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            session_char_budget: 12_000,
            class_char_cap: 48_000,
        }
    }
}

/// Summarization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarySettings {
    /// Largest amount of content sent to the provider in a single call.
    pub max_input_chars: usize,
    /// Sampling temperature for summaries.
    pub temperature: f32,
    /// Summarize new sessions as soon as they are added.
    pub auto_summarize: bool,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            max_input_chars: 60_000,
            temperature: 0.5,
            auto_summarize: true,
        }
    }
}

/// Record storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Storage backend (sqlite, memory).
    pub backend: String,
    /// Path to SQLite database (for sqlite backend).
    pub sqlite_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            sqlite_path: "~/.lekt/lekt.db".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
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
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Check values that would otherwise fail deep inside a request.
    pub fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.llm.base_url {
            url::Url::parse(base_url).map_err(|e| {
                LektError::InvalidConfig(format!("llm.base_url '{}' is not a URL: {}", base_url, e))
            })?;
        }
        if self.context.session_char_budget == 0 {
            return Err(LektError::InvalidConfig(
                "context.session_char_budget must be greater than zero".to_string(),
            ));
        }
        if self.context.class_char_cap < self.context.session_char_budget {
            return Err(LektError::InvalidConfig(format!(
                "context.class_char_cap ({}) must be at least context.session_char_budget ({})",
                self.context.class_char_cap, self.context.session_char_budget
            )));
        }
        if self.summary.max_input_chars == 0 {
            return Err(LektError::InvalidConfig(
                "summary.max_input_chars must be greater than zero".to_string(),
            ));
        }
        if !matches!(self.storage.backend.as_str(), "sqlite" | "memory") {
            return Err(LektError::InvalidConfig(format!(
                "Unknown storage backend '{}' (expected sqlite or memory)",
                self.storage.backend
            )));
        }
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lekt")
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
        Self::expand_path(&self.storage.sqlite_path)
    }

    /// Runtime settings written by `update_settings`, layered over this file.
    pub fn runtime_settings_path(&self) -> PathBuf {
        self.data_dir().join("settings.json")
    }
}
