//! Settings command implementation.

use crate::cli::{Output, SettingsAction};
use crate::config::{RuntimeConfig, Settings, SettingsUpdate, SettingsView};
use anyhow::Result;

/// Run the settings command.
pub fn run_settings(action: &SettingsAction, settings: &Settings) -> Result<()> {
    let runtime = RuntimeConfig::load(settings);

    match action {
        SettingsAction::Show => {
            Output::header("Runtime Settings");
            print_view(&runtime.get_settings());

            Output::header("Static Configuration");
            Output::kv("Temperature", &settings.llm.temperature.to_string());
            Output::kv("Max output tokens", &settings.llm.max_output_tokens.to_string());
            Output::kv("Session char budget", &settings.context.session_char_budget.to_string());
            Output::kv("Class char cap", &settings.context.class_char_cap.to_string());
            Output::kv("Auto summarize", &settings.summary.auto_summarize.to_string());
            Output::kv("Storage", &settings.storage.backend);
            if let Some(base_url) = &settings.llm.base_url {
                Output::kv("Base URL", base_url);
            }
        }

        SettingsAction::Set {
            provider,
            model,
            asr_mode,
            reasoning,
        } => {
            let update = SettingsUpdate {
                provider: provider.clone(),
                model: model.clone(),
                asr_mode: asr_mode.clone(),
                reasoning: *reasoning,
            };

            if update.provider.is_none()
                && update.model.is_none()
                && update.asr_mode.is_none()
                && update.reasoning.is_none()
            {
                Output::warning("Nothing to update. Pass --provider, --model, --asr-mode or --reasoning.");
                return Ok(());
            }

            let view = runtime.update_settings(&update)?;
            Output::success("Settings updated");
            print_view(&view);
        }

        SettingsAction::Path => {
            Output::kv("Config file", &Settings::default_config_path().display().to_string());
            Output::kv("Runtime settings", &settings.runtime_settings_path().display().to_string());
            Output::kv("Database", &settings.sqlite_path().display().to_string());
        }
    }

    Ok(())
}

fn print_view(view: &SettingsView) {
    Output::kv("Provider", &view.provider.to_string());
    Output::kv("Model", &view.model);
    Output::kv("ASR mode", &view.asr_mode.to_string());
    Output::kv("Reasoning", &view.reasoning.to_string());
}
