//! Ask command implementations.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::qa::{AnswerEvent, AnswerStream};
use anyhow::Result;
use futures::StreamExt;
use std::io::Write;

/// Run the ask command for a single session.
pub async fn run_ask(class_id: &str, session_id: &str, question: &str, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    check_provider(&orchestrator)?;

    let answer = orchestrator.ask_session(class_id, session_id, question).await?;
    print_answer(answer).await
}

/// Run the ask command across every session of a class.
pub async fn run_ask_all(class_id: &str, question: &str, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    check_provider(&orchestrator)?;

    let answer = orchestrator.ask_class(class_id, question).await?;
    print_answer(answer).await
}

/// Run the ask command across several classes (all when none are named).
pub async fn run_ask_classes(class_ids: &[String], question: &str, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    check_provider(&orchestrator)?;

    let answer = orchestrator.ask_all(Some(class_ids), question).await?;
    print_answer(answer).await
}

fn check_provider(orchestrator: &Orchestrator) -> Result<()> {
    let provider = orchestrator.get_settings().provider;
    if let Err(e) = preflight::check(Operation::Ask, provider) {
        Output::error(&format!("{}", e));
        Output::info("Run 'lekt doctor' for detailed diagnostics.");
        return Err(e.into());
    }
    Ok(())
}

/// Print fragments as they arrive.
async fn print_answer(mut answer: AnswerStream) -> Result<()> {
    let spinner = Output::spinner("Thinking...");
    let mut started = false;

    println!();
    while let Some(event) = answer.next().await {
        match event {
            AnswerEvent::Fragment(text) => {
                if !started {
                    spinner.finish_and_clear();
                    started = true;
                }
                print!("{}", text);
                std::io::stdout().flush()?;
            }
            AnswerEvent::End => {
                spinner.finish_and_clear();
                println!("\n");
            }
            AnswerEvent::Error(error) => {
                spinner.finish_and_clear();
                if started {
                    println!();
                }
                let error = error.to_error();
                Output::error(&format!("Failed to generate answer: {}", error));
                if error.is_transient() {
                    Output::info("The provider may be busy. Try again in a moment.");
                }
                return Err(error.into());
            }
        }
    }

    Ok(())
}
