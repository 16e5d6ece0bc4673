//! Service orchestrator for Lekt.
//!
//! Wires storage, runtime provider settings, prompts and the engines together
//! and exposes the operations used by the CLI and the HTTP server.

use crate::config::{Prompts, RuntimeConfig, Settings, SettingsUpdate, SettingsView};
use crate::context::ContextBuilder;
use crate::error::{LektError, Result};
use crate::http::create_client_with_timeout;
use crate::provider::{Credentials, HttpProviderFactory, ProviderFactory};
use crate::qa::{AnswerStream, QaEngine};
use crate::store::{
    ContentStore, MemoryRecordStore, RecordStore, Session, SqliteRecordStore, Summary,
};
use crate::summary::SummaryEngine;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// The main orchestrator for Lekt.
pub struct Orchestrator {
    settings: Settings,
    runtime: Arc<RuntimeConfig>,
    store: Arc<ContentStore>,
    summaries: SummaryEngine,
    qa: QaEngine,
}

/// Outcome of adding a session.
#[derive(Debug, Clone, Serialize)]
pub struct AddSessionResult {
    pub session: Session,
    /// Summary generated right after ingestion, when enabled and successful.
    pub summary: Option<Summary>,
    /// Why automatic summarization failed. The session is stored regardless.
    pub summary_error: Option<String>,
}

impl Orchestrator {
    /// Create an orchestrator from settings, credentials from the environment
    /// and the configured storage backend.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let records: Arc<dyn RecordStore> = match settings.storage.backend.as_str() {
            "sqlite" => Arc::new(SqliteRecordStore::new(&settings.sqlite_path())?),
            "memory" => {
                warn!("Using in-memory storage; classes will not survive a restart");
                Arc::new(MemoryRecordStore::new())
            }
            other => {
                return Err(LektError::InvalidConfig(format!(
                    "Unknown storage backend: {}",
                    other
                )))
            }
        };

        let http = create_client_with_timeout(Duration::from_secs(settings.llm.timeout_seconds))?;
        let providers = Arc::new(
            HttpProviderFactory::new(http, Credentials::from_env())
                .with_base_url(settings.llm.base_url.clone()),
        );
        let runtime = Arc::new(RuntimeConfig::load(&settings));

        let current = runtime.get_settings();
        info!("Using {} ({})", current.provider, current.model);

        Ok(Self::with_components(
            settings, prompts, records, providers, runtime,
        ))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        records: Arc<dyn RecordStore>,
        providers: Arc<dyn ProviderFactory>,
        runtime: Arc<RuntimeConfig>,
    ) -> Self {
        let store = Arc::new(ContentStore::new(records));

        let summaries = SummaryEngine::new(
            store.clone(),
            runtime.clone(),
            providers.clone(),
            settings.summary.clone(),
        )
        .with_prompts(prompts.clone());

        let qa = QaEngine::new(
            runtime.clone(),
            providers,
            ContextBuilder::new(settings.context.session_char_budget),
            settings.context.class_char_cap,
        )
        .with_prompts(prompts);

        Self {
            settings,
            runtime,
            store,
            summaries,
            qa,
        }
    }

    /// Get the content store.
    pub fn store(&self) -> Arc<ContentStore> {
        self.store.clone()
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Ingest text as a new session, then summarize it if enabled.
    ///
    /// A failed summary does not undo the ingestion; it is reported in the
    /// result and can be retried with [`Orchestrator::summarize`].
    #[instrument(skip(self, content, metadata), fields(content_len = content.len()))]
    pub async fn add_session(
        &self,
        class_id: &str,
        title: &str,
        content: &str,
        metadata: HashMap<String, String>,
    ) -> Result<AddSessionResult> {
        let session = self
            .store
            .create_session_with_metadata(class_id, title, content, metadata)
            .await?;

        if !self.settings.summary.auto_summarize {
            return Ok(AddSessionResult {
                session,
                summary: None,
                summary_error: None,
            });
        }

        match self.summaries.summarize(&session, false).await {
            Ok(summary) => Ok(AddSessionResult {
                session,
                summary: Some(summary),
                summary_error: None,
            }),
            Err(e) => {
                warn!("Automatic summary for session {} failed: {}", session.id, e);
                Ok(AddSessionResult {
                    session,
                    summary: None,
                    summary_error: Some(e.to_string()),
                })
            }
        }
    }

    /// Return the cached summary of a session, or generate one.
    pub async fn summarize(&self, class_id: &str, session_id: &str, regenerate: bool) -> Result<Summary> {
        let session = self.store.get_session(class_id, session_id).await?;
        self.summaries.summarize(&session, regenerate).await
    }

    /// Stream an answer about one session.
    pub async fn ask_session(&self, class_id: &str, session_id: &str, question: &str) -> Result<AnswerStream> {
        let session = self.store.get_session(class_id, session_id).await?;
        self.qa.ask(&session, question)
    }

    /// Stream an answer drawing on every session of a class.
    pub async fn ask_class(&self, class_id: &str, question: &str) -> Result<AnswerStream> {
        let class = self.store.get_class(class_id).await?;
        let sessions = self.store.class_sessions(class_id).await?;
        self.qa.ask_across_class(&class.name, &sessions, question)
    }

    /// Stream an answer drawing on several classes at once.
    ///
    /// `None` (or an empty list) means every class. Session titles are prefixed
    /// with their class name so the answer can say where things came from.
    pub async fn ask_all(&self, class_ids: Option<&[String]>, question: &str) -> Result<AnswerStream> {
        let classes = match class_ids {
            Some(ids) if !ids.is_empty() => {
                let mut classes = Vec::with_capacity(ids.len());
                for id in ids {
                    classes.push(self.store.get_class(id).await?);
                }
                classes
            }
            _ => self.store.list_classes().await?,
        };

        let mut sessions = Vec::new();
        for class in &classes {
            for mut session in self.store.class_sessions(&class.id).await? {
                session.title = format!("{}: {}", class.name, session.title);
                sessions.push(session);
            }
        }

        let scope = match class_ids {
            Some(ids) if !ids.is_empty() => classes
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            _ => "all classes".to_string(),
        };

        self.qa.ask_across_class(&scope, &sessions, question)
    }

    /// Current runtime settings.
    pub fn get_settings(&self) -> SettingsView {
        self.runtime.get_settings()
    }

    /// Apply a partial settings update; later requests use the new values.
    pub fn update_settings(&self, update: &SettingsUpdate) -> Result<SettingsView> {
        self.runtime.update_settings(update)
    }
}
