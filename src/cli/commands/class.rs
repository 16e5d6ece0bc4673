//! Class command implementation.

use crate::cli::{ClassAction, Output};
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::io::Write;

/// Run a class management command.
pub async fn run_class(action: &ClassAction, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let store = orchestrator.store();

    match action {
        ClassAction::Create { name, code } => {
            let class = store.create_class(name, code.as_deref()).await?;
            Output::success(&format!("Created class '{}'", class.name));
            Output::kv("ID", &class.id);
            Output::kv("Code", &class.code);
            println!();
            Output::info(&format!(
                "Add a session with: lekt session add {} <file>",
                class.id
            ));
        }

        ClassAction::List => {
            let classes = store.list_classes().await?;
            if classes.is_empty() {
                Output::info("No classes yet. Use 'lekt class create <name>' to add one.");
                return Ok(());
            }

            Output::header(&format!("Classes ({})", classes.len()));
            println!();
            for class in &classes {
                Output::class_info(class);
            }
        }

        ClassAction::Show { class_id } => {
            let class = store.get_class(class_id).await?;
            let sessions = store.list_sessions(class_id).await?;

            Output::header(&class.name);
            Output::kv("ID", &class.id);
            Output::kv("Code", &class.code);
            Output::kv("Created", &class.created_at.format("%Y-%m-%d %H:%M").to_string());
            Output::kv("Sessions", &sessions.len().to_string());

            if !sessions.is_empty() {
                println!();
                for session in &sessions {
                    Output::session_info(session);
                }
            }
        }

        ClassAction::Delete { class_id, yes } => {
            let class = store.get_class(class_id).await?;

            if !yes && !confirm(&format!(
                "Delete '{}' and its {} session(s)?",
                class.name,
                class.session_ids.len()
            ))? {
                Output::info("Cancelled.");
                return Ok(());
            }

            store.delete_class(class_id).await?;
            Output::success(&format!("Deleted class '{}'", class.name));
        }
    }

    Ok(())
}

/// Ask a yes/no question on the terminal.
fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
