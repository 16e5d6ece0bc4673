//! Configuration module for Lekt.
//!
//! Handles loading static settings and prompt templates, and the runtime
//! provider configuration that can change while the process is running.

mod prompts;
mod runtime;
mod settings;

pub use prompts::{Prompts, QaPrompts, SummaryPrompts};
pub use runtime::{ProviderConfig, RuntimeConfig, RuntimeSnapshot, SettingsUpdate, SettingsView};
pub use settings::{
    AsrMode, ContextSettings, GeneralSettings, LlmSettings, PromptSettings, ServerSettings,
    Settings, StorageSettings, SummarySettings,
};
