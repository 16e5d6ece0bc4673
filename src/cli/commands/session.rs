//! Session command implementation.

use crate::cli::output::content_preview;
use crate::cli::{Output, SessionAction};
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Run a session management command.
pub async fn run_session(action: &SessionAction, mut settings: Settings) -> Result<()> {
    match action {
        SessionAction::Add {
            class_id,
            file,
            title,
            no_summary,
        } => {
            if *no_summary {
                settings.summary.auto_summarize = false;
            }
            let orchestrator = Orchestrator::new(settings)?;

            let (content, source) = read_input(file)?;
            let title = title.clone().unwrap_or_else(|| default_title(file));

            let mut metadata = HashMap::new();
            metadata.insert("source".to_string(), source);

            let spinner = orchestrator
                .settings()
                .summary
                .auto_summarize
                .then(|| Output::spinner("Adding session and generating summary..."));

            let result = orchestrator
                .add_session(class_id, &title, &content, metadata)
                .await;

            if let Some(spinner) = &spinner {
                spinner.finish_and_clear();
            }
            let result = result?;

            Output::success(&format!(
                "Added session '{}' ({} chars)",
                result.session.title,
                result.session.content.chars().count()
            ));
            Output::kv("ID", &result.session.id);

            if let Some(summary) = &result.summary {
                Output::summary(summary);
            } else if let Some(error) = &result.summary_error {
                Output::warning(&format!("Summary failed: {}", error));
                Output::info(&format!(
                    "Retry with: lekt summarize {} {}",
                    class_id, result.session.id
                ));
            }
        }

        SessionAction::List { class_id } => {
            let orchestrator = Orchestrator::new(settings)?;
            let class = orchestrator.store().get_class(class_id).await?;
            let sessions = orchestrator.store().list_sessions(class_id).await?;

            if sessions.is_empty() {
                Output::info(&format!(
                    "No sessions in '{}' yet. Use 'lekt session add {} <file>'.",
                    class.name, class_id
                ));
                return Ok(());
            }

            Output::header(&format!("{} - Sessions ({})", class.name, sessions.len()));
            println!();
            for session in &sessions {
                Output::session_info(session);
            }
        }

        SessionAction::Show {
            class_id,
            session_id,
            content,
        } => {
            let orchestrator = Orchestrator::new(settings)?;
            let session = orchestrator.store().get_session(class_id, session_id).await?;

            Output::header(&session.title);
            Output::kv("ID", &session.id);
            Output::kv("Created", &session.created_at.format("%Y-%m-%d %H:%M").to_string());
            Output::kv("Length", &format!("{} chars", session.content.chars().count()));
            for (key, value) in &session.metadata {
                Output::kv(key, value);
            }

            println!();
            if *content {
                println!("{}", session.content);
            } else {
                println!("{}", content_preview(&session.content, 300));
            }

            match &session.summary {
                Some(summary) => Output::summary(summary),
                None => {
                    println!();
                    Output::info(&format!(
                        "No summary yet. Generate one with: lekt summarize {} {}",
                        class_id, session_id
                    ));
                }
            }
        }
    }

    Ok(())
}

/// Read session text from a file or stdin. Returns the text and its source label.
fn read_input(file: &str) -> Result<(String, String)> {
    if file == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read session text from stdin")?;
        return Ok((content, "stdin".to_string()));
    }

    let path = Settings::expand_path(file);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {} as UTF-8 text", path.display()))?;
    Ok((content, path.display().to_string()))
}

/// Title derived from the file name, or empty to let the store pick one.
fn default_title(file: &str) -> String {
    if file == "-" {
        return String::new();
    }
    Path::new(file)
        .file_stem()
        .map(|stem| stem.to_string_lossy().replace(['_', '-'], " "))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_title() {
        assert_eq!(default_title("notes/lecture_01-lists.txt"), "lecture 01 lists");
        assert_eq!(default_title("-"), "");
    }

    #[test]
    fn test_read_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lecture.txt");
        std::fs::write(&path, "Recursion basics").unwrap();

        let (content, source) = read_input(path.to_str().unwrap()).unwrap();
        assert_eq!(content, "Recursion basics");
        assert!(source.ends_with("lecture.txt"));
    }
}
