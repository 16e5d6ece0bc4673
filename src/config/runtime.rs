//! Process-wide runtime settings.
//!
//! The active provider configuration is created once from [`Settings`] (plus
//! the persisted `settings.json` overlay) and shared through a
//! [`RuntimeConfig`] handle. Updates replace the whole snapshot at once, so a
//! request that already took a snapshot keeps a consistent view while later
//! requests see the new values.

use super::settings::{AsrMode, Settings};
use crate::error::{LektError, Result};
use crate::provider::{CompletionOptions, ProviderKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{info, warn};

/// Provider selection used for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub reasoning: bool,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl ProviderConfig {
    /// Generation options derived from this configuration.
    pub fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            reasoning: self.reasoning,
        }
    }
}

/// One consistent view of the runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSnapshot {
    pub provider: ProviderConfig,
    pub asr_mode: AsrMode,
}

/// Settings as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsView {
    pub provider: ProviderKind,
    pub model: String,
    pub asr_mode: AsrMode,
    pub reasoning: bool,
}

/// Partial settings update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsUpdate {
    #[serde(alias = "llm_provider")]
    pub provider: Option<String>,
    pub model: Option<String>,
    pub asr_mode: Option<String>,
    pub reasoning: Option<bool>,
}

/// On-disk overlay written by [`RuntimeConfig::update_settings`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct PersistedOverlay {
    #[serde(skip_serializing_if = "Option::is_none")]
    llm_provider: Option<ProviderKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    asr_mode: Option<AsrMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<bool>,
}

/// Shared handle to the current runtime settings.
pub struct RuntimeConfig {
    current: RwLock<Arc<RuntimeSnapshot>>,
    /// Serializes updates; readers never wait on it.
    update_lock: Mutex<()>,
    overlay_path: Option<PathBuf>,
}

impl RuntimeConfig {
    /// Build the initial snapshot from static settings, without persistence.
    pub fn new(settings: &Settings) -> Self {
        Self {
            current: RwLock::new(Arc::new(Self::snapshot_from(settings))),
            update_lock: Mutex::new(()),
            overlay_path: None,
        }
    }

    /// Build the initial snapshot and layer the persisted overlay on top.
    ///
    /// An unreadable overlay is logged and ignored rather than preventing startup.
    pub fn load(settings: &Settings) -> Self {
        let path = settings.runtime_settings_path();
        let mut snapshot = Self::snapshot_from(settings);

        if path.exists() {
            match std::fs::read_to_string(&path)
                .map_err(LektError::from)
                .and_then(|s| serde_json::from_str::<PersistedOverlay>(&s).map_err(LektError::from))
            {
                Ok(overlay) => {
                    if let Some(provider) = overlay.llm_provider {
                        snapshot.provider.provider = provider;
                        snapshot.provider.model = provider.default_model().to_string();
                    }
                    if let Some(model) = overlay.model.filter(|m| !m.trim().is_empty()) {
                        snapshot.provider.model = model;
                    }
                    if let Some(asr_mode) = overlay.asr_mode {
                        snapshot.asr_mode = asr_mode;
                    }
                    if let Some(reasoning) = overlay.reasoning {
                        snapshot.provider.reasoning = reasoning;
                    }
                    info!("Loaded runtime settings from {:?}", path);
                }
                Err(e) => warn!("Ignoring unreadable runtime settings {:?}: {}", path, e),
            }
        }

        Self {
            current: RwLock::new(Arc::new(snapshot)),
            update_lock: Mutex::new(()),
            overlay_path: Some(path),
        }
    }

    fn snapshot_from(settings: &Settings) -> RuntimeSnapshot {
        RuntimeSnapshot {
            provider: ProviderConfig {
                provider: settings.llm.provider,
                model: settings.llm.model_or_default(),
                reasoning: settings.llm.reasoning,
                temperature: settings.llm.temperature,
                max_output_tokens: settings.llm.max_output_tokens,
            },
            asr_mode: settings.general.asr_mode,
        }
    }

    /// The current snapshot. Cheap; callers hold it for the whole request.
    pub fn snapshot(&self) -> Arc<RuntimeSnapshot> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The current provider configuration.
    pub fn provider_config(&self) -> ProviderConfig {
        self.snapshot().provider.clone()
    }

    /// Settings as exposed through the settings interface.
    pub fn get_settings(&self) -> SettingsView {
        let snapshot = self.snapshot();
        SettingsView {
            provider: snapshot.provider.provider,
            model: snapshot.provider.model.clone(),
            asr_mode: snapshot.asr_mode,
            reasoning: snapshot.provider.reasoning,
        }
    }

    /// Validate and apply a partial update.
    ///
    /// Nothing changes unless every field is valid and the overlay (when
    /// configured) was written successfully.
    pub fn update_settings(&self, update: &SettingsUpdate) -> Result<SettingsView> {
        let provider = update
            .provider
            .as_deref()
            .map(str::parse::<ProviderKind>)
            .transpose()?;
        let asr_mode = update
            .asr_mode
            .as_deref()
            .map(str::parse::<AsrMode>)
            .transpose()?;
        let model = match update.model.as_deref().map(str::trim) {
            Some("") => {
                return Err(LektError::InvalidConfig("model must not be empty".to_string()))
            }
            other => other.map(str::to_string),
        };

        // The overlay is written while only the update lock is held, so
        // readers keep using the old snapshot until the swap below.
        let _updating = self.update_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = RuntimeSnapshot::clone(&self.snapshot());

        if let Some(provider) = provider {
            if provider != next.provider.provider {
                next.provider.provider = provider;
                next.provider.model = provider.default_model().to_string();
            }
        }
        if let Some(model) = model {
            next.provider.model = model;
        }
        if let Some(asr_mode) = asr_mode {
            next.asr_mode = asr_mode;
        }
        if let Some(reasoning) = update.reasoning {
            next.provider.reasoning = reasoning;
        }

        if let Some(path) = &self.overlay_path {
            Self::persist(path, &next)?;
        }

        info!(
            provider = %next.provider.provider,
            model = %next.provider.model,
            asr_mode = %next.asr_mode,
            "Runtime settings updated"
        );
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);

        Ok(self.get_settings())
    }

    fn persist(path: &PathBuf, snapshot: &RuntimeSnapshot) -> Result<()> {
        let overlay = PersistedOverlay {
            llm_provider: Some(snapshot.provider.provider),
            model: Some(snapshot.provider.model.clone()),
            asr_mode: Some(snapshot.asr_mode),
            reasoning: Some(snapshot.provider.reasoning),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&overlay)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
