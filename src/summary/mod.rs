//! Structured session summaries.
//!
//! A summary is generated once per session and cached on the session record.
//! Later calls return the cached value unless regeneration is requested.

use crate::config::{Prompts, RuntimeConfig, SummarySettings};
use crate::context::split_chars;
use crate::error::Result;
use crate::provider::{ChatMessage, CompletionOptions, LlmProvider, ProviderFactory};
use crate::store::{ContentStore, Session, Summary};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Generates and caches session summaries.
pub struct SummaryEngine {
    store: Arc<ContentStore>,
    runtime: Arc<RuntimeConfig>,
    providers: Arc<dyn ProviderFactory>,
    prompts: Prompts,
    settings: SummarySettings,
}

impl SummaryEngine {
    pub fn new(
        store: Arc<ContentStore>,
        runtime: Arc<RuntimeConfig>,
        providers: Arc<dyn ProviderFactory>,
        settings: SummarySettings,
    ) -> Self {
        Self {
            store,
            runtime,
            providers,
            prompts: Prompts::default(),
            settings,
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Return the session's summary, generating it when missing or when
    /// `regenerate` is set.
    ///
    /// The cached summary is read from the store, so a caller holding an older
    /// copy of the session still gets the cached value. On provider failure
    /// nothing is written and the previous summary stays in place.
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub async fn summarize(&self, session: &Session, regenerate: bool) -> Result<Summary> {
        let current = self
            .store
            .get_session(&session.class_id, &session.id)
            .await?;

        if !regenerate {
            if let Some(summary) = current.summary {
                debug!("Using cached summary");
                return Ok(summary);
            }
        }

        let config = self.runtime.provider_config();
        let provider = self.providers.create(&config)?;
        let options = config
            .options()
            .with_temperature(self.settings.temperature)
            .effective_for(provider.capabilities());

        info!(
            "Summarizing session '{}' with {} ({})",
            current.title,
            provider.name(),
            provider.model()
        );

        let (material, condensed) = self
            .prepare_material(provider.as_ref(), &current, &options)
            .await?;

        let mut vars = HashMap::new();
        vars.insert("title".to_string(), current.title.clone());
        vars.insert("content".to_string(), material);
        vars.insert("truncated".to_string(), condensed.to_string());

        let user_prompt = self
            .prompts
            .render_with_custom(&self.prompts.summary.user, &vars);

        let response = provider
            .complete(
                &self.prompts.summary.system,
                &[ChatMessage::user(user_prompt)],
                &options,
            )
            .await?;

        let summary = parse_summary(&response, &provider.name(), provider.model());
        self.store
            .set_summary(&current.class_id, &current.id, summary.clone())
            .await?;

        info!(
            "Stored summary with {} key points",
            summary.key_points.len()
        );
        Ok(summary)
    }

    /// Content to summarize, condensed part by part when it is too long for
    /// one request. Returns the material and whether it was condensed.
    async fn prepare_material(
        &self,
        provider: &dyn LlmProvider,
        session: &Session,
        options: &CompletionOptions,
    ) -> Result<(String, bool)> {
        let limit = self.settings.max_input_chars;
        if session.content.chars().count() <= limit {
            return Ok((session.content.clone(), false));
        }

        let parts = split_chars(&session.content, limit);
        info!("Content exceeds {} chars, condensing {} parts", limit, parts.len());

        let mut notes = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let mut vars = HashMap::new();
            vars.insert("title".to_string(), session.title.clone());
            vars.insert("part".to_string(), (i + 1).to_string());
            vars.insert("parts".to_string(), parts.len().to_string());
            vars.insert("content".to_string(), part.to_string());

            let user_prompt = self
                .prompts
                .render_with_custom(&self.prompts.summary.part_user, &vars);

            let note = provider
                .complete(
                    &self.prompts.summary.part_system,
                    &[ChatMessage::user(user_prompt)],
                    options,
                )
                .await?;

            debug!("Condensed part {}/{}", i + 1, parts.len());
            notes.push(format!("Part {}:\n{}", i + 1, note.trim()));
        }

        Ok((notes.join("\n\n"), true))
    }
}

/// Parse a model response into a [`Summary`].
///
/// Accepts a JSON object surrounded by prose or code fences. When no usable
/// object is found, the raw response becomes the `details` section.
pub fn parse_summary(response: &str, provider: &str, model: &str) -> Summary {
    let mut summary = Summary {
        key_points: Vec::new(),
        details: Vec::new(),
        action_items: Vec::new(),
        open_questions: Vec::new(),
        vocabulary: Vec::new(),
        generated_at: Utc::now(),
        provider: provider.to_string(),
        model: model.to_string(),
    };

    let json_start = response.find('{');
    let json_end = response.rfind('}');
    let parsed = match (json_start, json_end) {
        (Some(start), Some(end)) if end > start => {
            serde_json::from_str::<Value>(&response[start..=end]).ok()
        }
        _ => None,
    };

    if let Some(Value::Object(map)) = parsed {
        summary.key_points = string_list(map.get("key_points"));
        summary.details = string_list(map.get("details"));
        summary.action_items = string_list(map.get("action_items"));
        summary.open_questions = string_list(map.get("open_questions"));
        summary.vocabulary = string_list(map.get("vocabulary"));
    }

    if summary.is_empty() {
        let raw = response.trim();
        if !raw.is_empty() {
            warn!("Could not parse structured summary, keeping raw response");
            summary.details.push(raw.to_string());
        }
    }

    summary
}

/// Lenient conversion of a JSON field to a list of strings.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(item_text).collect(),
        Some(Value::String(text)) => text
            .lines()
            .map(|line| line.trim().trim_start_matches(['-', '*']).trim())
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(key, value)| format!("{}: {}", key, scalar_text(value)))
            .collect(),
        _ => Vec::new(),
    }
}

fn item_text(item: &Value) -> Option<String> {
    match item {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::Object(map) => {
            let term = map.get("term").or_else(|| map.get("word"));
            let definition = map.get("definition").or_else(|| map.get("meaning"));
            match (term, definition) {
                (Some(term), Some(definition)) => Some(format!(
                    "{}: {}",
                    scalar_text(term),
                    scalar_text(definition)
                )),
                _ => Some(
                    map.values()
                        .map(scalar_text)
                        .collect::<Vec<_>>()
                        .join(" - "),
                ),
            }
        }
        other => Some(scalar_text(other)),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::LektError;
    use crate::provider::mock::{MockFactory, MockProvider};
    use crate::store::MemoryRecordStore;

    const REPLY: &str = r#"Here are your notes:
```json
{"key_points": ["Lists are ordered"], "details": [], "action_items": ["Problem set 1"],
 "open_questions": [], "vocabulary": [{"term": "dict", "definition": "key-value map"}]}
```"#;

    struct Fixture {
        engine: SummaryEngine,
        store: Arc<ContentStore>,
        provider: Arc<MockProvider>,
        session: Session,
    }

    async fn fixture(provider: MockProvider, content: &str, max_input_chars: usize) -> Fixture {
        let store = Arc::new(ContentStore::new(Arc::new(MemoryRecordStore::new())));
        let class = store.create_class("Intro to CS", Some("CS101")).await.unwrap();
        let session = store
            .create_session(&class.id, "Lists and dicts", content)
            .await
            .unwrap();

        let provider = Arc::new(provider);
        let runtime = Arc::new(RuntimeConfig::new(&Settings::default()));
        let settings = SummarySettings {
            max_input_chars,
            ..Default::default()
        };
        let engine = SummaryEngine::new(
            store.clone(),
            runtime,
            Arc::new(MockFactory::new(provider.clone())),
            settings,
        );

        Fixture {
            engine,
            store,
            provider,
            session,
        }
    }

    #[test]
    fn test_parse_fenced_json() {
        let summary = parse_summary(REPLY, "nvidia", "m");
        assert_eq!(summary.key_points, vec!["Lists are ordered"]);
        assert_eq!(summary.action_items, vec!["Problem set 1"]);
        assert_eq!(summary.vocabulary, vec!["dict: key-value map"]);
        assert_eq!(summary.provider, "nvidia");
    }

    #[test]
    fn test_parse_string_sections() {
        let summary = parse_summary(
            r#"{"key_points": "- first\n- second", "details": null}"#,
            "groq",
            "m",
        );
        assert_eq!(summary.key_points, vec!["first", "second"]);
        assert!(summary.details.is_empty());
    }

    #[test]
    fn test_parse_fallback_keeps_raw_text() {
        let summary = parse_summary("The lecture covered recursion.", "groq", "m");
        assert!(summary.key_points.is_empty());
        assert_eq!(summary.details, vec!["The lecture covered recursion."]);
    }

    #[tokio::test]
    async fn test_cached_summary_is_reused() {
        let f = fixture(MockProvider::new().with_replies(&[REPLY]), "Lists and dicts", 1000).await;

        let first = f.engine.summarize(&f.session, false).await.unwrap();
        let second = f.engine.summarize(&f.session, false).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(f.provider.calls(), 1);

        let stored = f.store.get_session(&f.session.class_id, &f.session.id).await.unwrap();
        assert_eq!(stored.summary, Some(first));
    }

    #[tokio::test]
    async fn test_regenerate_calls_provider_again() {
        let f = fixture(MockProvider::new().with_replies(&[REPLY]), "Lists and dicts", 1000).await;

        f.engine.summarize(&f.session, false).await.unwrap();
        f.engine.summarize(&f.session, true).await.unwrap();

        assert_eq!(f.provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_prompt_contains_full_content() {
        let f = fixture(MockProvider::new().with_replies(&[REPLY]), "Dicts map keys to values", 1000).await;

        f.engine.summarize(&f.session, false).await.unwrap();

        let calls = f.provider.recorded();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].user.contains("Dicts map keys to values"));
        assert!(calls[0].user.contains("Lists and dicts"));
        assert!(!calls[0].user.contains("condensed"));
        assert!(calls[0].system.contains("key_points"));
    }

    #[tokio::test]
    async fn test_long_content_is_condensed_in_parts() {
        let content = "word ".repeat(60);
        let f = fixture(
            MockProvider::new().with_replies(&["note one", "note two", "note three", REPLY]),
            &content,
            120,
        )
        .await;

        let summary = f.engine.summarize(&f.session, false).await.unwrap();
        assert_eq!(summary.key_points, vec!["Lists are ordered"]);

        let calls = f.provider.recorded();
        assert_eq!(calls.len(), 4);
        assert!(calls[0].user.contains("part 1 of 3"));
        let last = &calls[3].user;
        assert!(last.contains("note one") && last.contains("note three"));
        assert!(last.contains("condensed"));
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_previous_summary() {
        let f = fixture(MockProvider::new().failing(), "Recursion basics", 1000).await;
        let previous = parse_summary(REPLY, "nvidia", "m");
        f.store
            .set_summary(&f.session.class_id, &f.session.id, previous.clone())
            .await
            .unwrap();

        let err = f.engine.summarize(&f.session, true).await.unwrap_err();
        assert!(matches!(err, LektError::ProviderUnavailable { .. }));

        let stored = f.store.get_session(&f.session.class_id, &f.session.id).await.unwrap();
        assert_eq!(stored.summary, Some(previous));
    }
}
