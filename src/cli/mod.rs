//! CLI module for Lekt.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Lekt - Class Content Summaries and Q&A
///
/// A local-first CLI for organizing lecture transcripts and class documents,
/// generating structured summaries and asking questions about them.
#[derive(Parser, Debug)]
#[command(name = "lekt")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check credentials, storage and configuration
    Doctor,

    /// Manage classes
    Class {
        #[command(subcommand)]
        action: ClassAction,
    },

    /// Manage sessions within a class
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Show or generate the structured summary of a session
    Summarize {
        /// Class ID
        class_id: String,

        /// Session ID
        session_id: String,

        /// Generate a new summary even if one is cached
        #[arg(short, long)]
        regenerate: bool,
    },

    /// Ask a question about one session
    Ask {
        /// Class ID
        class_id: String,

        /// Session ID
        session_id: String,

        /// The question to ask
        question: String,
    },

    /// Ask a question across every session of a class
    AskAll {
        /// Class ID
        class_id: String,

        /// The question to ask
        question: String,
    },

    /// Ask a question across several classes
    AskClasses {
        /// The question to ask
        question: String,

        /// Class ID to include (repeatable; defaults to every class)
        #[arg(long = "class", value_name = "CLASS_ID")]
        classes: Vec<String>,
    },

    /// Show or change runtime provider settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to (defaults to server.host from config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port from config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ClassAction {
    /// Create a new class
    Create {
        /// Display name (e.g., "Intro to Computer Science")
        name: String,

        /// Short course code (e.g., "CS101")
        #[arg(long)]
        code: Option<String>,
    },

    /// List all classes
    List,

    /// Show a class and its sessions
    Show {
        /// Class ID
        class_id: String,
    },

    /// Delete a class and all of its sessions
    Delete {
        /// Class ID
        class_id: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// Add a session from a text file or stdin
    Add {
        /// Class ID
        class_id: String,

        /// Text file with the transcript or document ('-' for stdin)
        #[arg(default_value = "-")]
        file: String,

        /// Session title (defaults to the file name)
        #[arg(short, long)]
        title: Option<String>,

        /// Skip automatic summarization
        #[arg(long)]
        no_summary: bool,
    },

    /// List sessions of a class
    List {
        /// Class ID
        class_id: String,
    },

    /// Show a session
    Show {
        /// Class ID
        class_id: String,

        /// Session ID
        session_id: String,

        /// Print the full content instead of a preview
        #[arg(long)]
        content: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Show current runtime settings
    Show,

    /// Update runtime settings
    Set {
        /// LLM provider (nvidia, groq, openai)
        #[arg(long)]
        provider: Option<String>,

        /// Model name (defaults to the provider's model when the provider changes)
        #[arg(long)]
        model: Option<String>,

        /// Speech recognition mode (free, fast)
        #[arg(long)]
        asr_mode: Option<String>,

        /// Enable or disable extended reasoning
        #[arg(long)]
        reasoning: Option<bool>,
    },

    /// Show configuration file paths
    Path,
}
