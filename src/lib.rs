//! Lekt - Class Content Summaries and Q&A
//!
//! A local-first CLI and server that turns lecture transcripts and class
//! documents into structured study summaries and answers questions about them.
//!
//! The name "Lekt" is a nod to "lecture."
//!
//! # Overview
//!
//! Lekt allows you to:
//! - Organize transcripts and documents into classes and sessions
//! - Generate structured summaries (key points, action items, vocabulary)
//! - Ask questions about one session or a whole class, with streamed answers
//! - Switch between LLM providers (NVIDIA, Groq, OpenAI) at runtime
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Static settings, prompt templates and runtime provider settings
//! - `provider` - LLM provider abstraction over OpenAI-compatible APIs
//! - `store` - Class and session storage (memory, SQLite)
//! - `context` - Bounded prompt context built from sessions
//! - `summary` - Cached structured summaries
//! - `qa` - Streaming question answering
//! - `orchestrator` - Service wiring used by the CLI and server
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use lekt::config::Settings;
//! use lekt::orchestrator::Orchestrator;
//! use lekt::qa::AnswerEvent;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let lekt = Orchestrator::new(settings)?;
//!
//!     let class = lekt.store().create_class("Intro to CS", Some("CS101")).await?;
//!     lekt.add_session(&class.id, "Lecture 1", "Today we cover lists...", Default::default())
//!         .await?;
//!
//!     let mut answer = lekt.ask_class(&class.id, "What are lists?").await?;
//!     while let Some(event) = answer.next().await {
//!         if let AnswerEvent::Fragment(text) = event {
//!             print!("{}", text);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod provider;
pub mod qa;
pub mod store;
pub mod summary;

pub use error::{LektError, Result};
