//! Summarize command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the summarize command.
pub async fn run_summarize(
    class_id: &str,
    session_id: &str,
    regenerate: bool,
    settings: Settings,
) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let session = orchestrator.store().get_session(class_id, session_id).await?;

    let needs_provider = regenerate || session.summary.is_none();
    if needs_provider {
        let provider = orchestrator.get_settings().provider;
        if let Err(e) = preflight::check(Operation::Summarize, provider) {
            Output::error(&format!("{}", e));
            Output::info("Run 'lekt doctor' for detailed diagnostics.");
            return Err(e.into());
        }
    }

    let spinner = needs_provider.then(|| Output::spinner("Generating summary..."));
    let result = orchestrator.summarize(class_id, session_id, regenerate).await;
    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }

    match result {
        Ok(summary) => {
            Output::header(&session.title);
            Output::summary(&summary);
        }
        Err(e) => {
            Output::error(&format!("Failed to generate summary: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
