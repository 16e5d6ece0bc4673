//! Streaming question answering over session content.
//!
//! Answers are delivered as an [`AnswerStream`]: text fragments in provider
//! order followed by exactly one terminal event, [`AnswerEvent::End`] or
//! [`AnswerEvent::Error`]. The provider is resolved when asking, so a missing
//! credential fails the call itself; the request is made lazily on first poll,
//! and dropping the stream drops the provider stream with it.

use crate::config::{Prompts, RuntimeConfig};
use crate::context::{bound_blocks, ContextBuilder};
use crate::error::{LektError, Result};
use crate::provider::{ChatMessage, CompletionOptions, LlmProvider, ProviderFactory, TextStream};
use crate::store::Session;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// One item of a streamed answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum AnswerEvent {
    /// Next piece of answer text.
    Fragment(String),
    /// The answer completed successfully.
    End,
    /// The answer failed; no further events follow.
    Error(AnswerError),
}

impl AnswerEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AnswerEvent::Fragment(_))
    }
}

/// Category of a failed answer, so callers can tell a retryable failure
/// from a configuration problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    RateLimited,
    ProviderUnavailable,
    InvalidInput,
}

/// Failure carried by [`AnswerEvent::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerError {
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub message: String,
}

impl AnswerError {
    /// Rebuild the library error this event was created from.
    pub fn to_error(&self) -> LektError {
        let provider = self.provider.clone().unwrap_or_default();
        let message = self.message.clone();
        match self.kind {
            ErrorKind::Authentication => LektError::Authentication { provider, message },
            ErrorKind::RateLimited => LektError::RateLimited { provider, message },
            ErrorKind::ProviderUnavailable => LektError::ProviderUnavailable { provider, message },
            ErrorKind::InvalidInput => LektError::InvalidInput(message),
        }
    }
}

impl From<&LektError> for AnswerError {
    fn from(error: &LektError) -> Self {
        let (kind, provider, message) = match error {
            LektError::Authentication { provider, message } => {
                (ErrorKind::Authentication, Some(provider.clone()), message.clone())
            }
            LektError::RateLimited { provider, message } => {
                (ErrorKind::RateLimited, Some(provider.clone()), message.clone())
            }
            LektError::ProviderUnavailable { provider, message } => {
                (ErrorKind::ProviderUnavailable, Some(provider.clone()), message.clone())
            }
            LektError::InvalidInput(message) => (ErrorKind::InvalidInput, None, message.clone()),
            // Anything else reaching a stream is reported as a provider failure.
            other => (ErrorKind::ProviderUnavailable, None, other.to_string()),
        };
        Self {
            kind,
            provider,
            message,
        }
    }
}

impl From<AnswerError> for LektError {
    fn from(error: AnswerError) -> Self {
        error.to_error()
    }
}

impl std::fmt::Display for AnswerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_error())
    }
}

/// Lazy sequence of answer events.
pub type AnswerStream = Pin<Box<dyn Stream<Item = AnswerEvent> + Send>>;

/// A prompt ready to be sent.
struct PendingRequest {
    provider: Arc<dyn LlmProvider>,
    system: String,
    user: String,
    options: CompletionOptions,
}

enum StreamState {
    Start(PendingRequest),
    Streaming(TextStream),
    Done,
}

/// Answers questions about one session or a whole class.
pub struct QaEngine {
    runtime: Arc<RuntimeConfig>,
    providers: Arc<dyn ProviderFactory>,
    prompts: Prompts,
    context: ContextBuilder,
    class_char_cap: usize,
}

impl QaEngine {
    pub fn new(
        runtime: Arc<RuntimeConfig>,
        providers: Arc<dyn ProviderFactory>,
        context: ContextBuilder,
        class_char_cap: usize,
    ) -> Self {
        Self {
            runtime,
            providers,
            prompts: Prompts::default(),
            context,
            class_char_cap,
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Stream an answer grounded in a single session.
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub fn ask(&self, session: &Session, question: &str) -> Result<AnswerStream> {
        let question = validate_question(question)?;

        let block = self.context.build_single_session_context(session);
        let mut vars = HashMap::new();
        vars.insert("context".to_string(), block.to_prompt());
        vars.insert("question".to_string(), question.to_string());

        let user = self
            .prompts
            .render_with_custom(&self.prompts.qa.session_user, &vars);

        let request = self.prepare(&self.prompts.qa.session_system, user)?;
        info!("Answering question about session '{}'", session.title);
        Ok(answer(request))
    }

    /// Stream an answer synthesized from several sessions of one class.
    ///
    /// All sessions go into a single prompt, oldest first. When they exceed the
    /// context cap, only the most recent ones are kept and the prompt notes how
    /// many were left out.
    #[instrument(skip(self, sessions), fields(sessions = sessions.len()))]
    pub fn ask_across_class(
        &self,
        class_name: &str,
        sessions: &[Session],
        question: &str,
    ) -> Result<AnswerStream> {
        let question = validate_question(question)?;
        if sessions.is_empty() {
            return Err(LektError::NotFound(format!(
                "sessions in class '{}'",
                class_name
            )));
        }

        let blocks = self.context.build_cross_class_context(sessions);
        let bounded = bound_blocks(blocks, self.class_char_cap);
        if bounded.excluded > 0 {
            warn!(
                "Excluded {} older sessions to fit the context cap",
                bounded.excluded
            );
        }

        let mut vars = HashMap::new();
        vars.insert("class_name".to_string(), class_name.to_string());
        vars.insert("context".to_string(), bounded.to_prompt());
        vars.insert("question".to_string(), question.to_string());

        let user = self
            .prompts
            .render_with_custom(&self.prompts.qa.class_user, &vars);

        let request = self.prepare(&self.prompts.qa.class_system, user)?;
        info!(
            "Answering question across {} sessions of '{}'",
            bounded.blocks.len(),
            class_name
        );
        Ok(answer(request))
    }

    /// Resolve the provider from the current settings.
    ///
    /// Construction errors such as a missing credential are returned here,
    /// before any stream exists.
    fn prepare(&self, system: &str, user: String) -> Result<PendingRequest> {
        let config = self.runtime.provider_config();
        let provider = self.providers.create(&config)?;
        let options = config.options().effective_for(provider.capabilities());
        Ok(PendingRequest {
            provider,
            system: system.to_string(),
            user,
            options,
        })
    }
}

/// Open the provider stream on first poll and relay it as answer events.
fn answer(request: PendingRequest) -> AnswerStream {
    Box::pin(stream::unfold(
        StreamState::Start(request),
        |state| async move {
            match state {
                StreamState::Start(request) => {
                    let opened = request
                        .provider
                        .stream(
                            &request.system,
                            &[ChatMessage::user(request.user)],
                            &request.options,
                        )
                        .await;
                    match opened {
                        Ok(text) => next_event(text).await,
                        Err(e) => {
                            warn!("Provider request failed: {}", e);
                            Some((AnswerEvent::Error((&e).into()), StreamState::Done))
                        }
                    }
                }
                StreamState::Streaming(text) => next_event(text).await,
                StreamState::Done => None,
            }
        },
    ))
}

async fn next_event(mut text: TextStream) -> Option<(AnswerEvent, StreamState)> {
    loop {
        match text.next().await {
            Some(Ok(fragment)) if fragment.is_empty() => continue,
            Some(Ok(fragment)) => {
                return Some((AnswerEvent::Fragment(fragment), StreamState::Streaming(text)))
            }
            Some(Err(e)) => {
                warn!("Provider stream failed: {}", e);
                return Some((AnswerEvent::Error((&e).into()), StreamState::Done));
            }
            None => {
                debug!("Answer complete");
                return Some((AnswerEvent::End, StreamState::Done));
            }
        }
    }
}

fn validate_question(question: &str) -> Result<&str> {
    let question = question.trim();
    if question.is_empty() {
        return Err(LektError::InvalidInput(
            "question must not be empty".to_string(),
        ));
    }
    Ok(question)
}

/// Collect a stream into its full text.
///
/// An error event becomes the error it was created from, so callers can still
/// distinguish e.g. [`LektError::RateLimited`] from [`LektError::Authentication`].
pub async fn collect_answer(mut answer: AnswerStream) -> Result<String> {
    let mut text = String::new();
    while let Some(event) = answer.next().await {
        match event {
            AnswerEvent::Fragment(fragment) => text.push_str(&fragment),
            AnswerEvent::End => return Ok(text),
            AnswerEvent::Error(error) => return Err(error.into()),
        }
    }
    Err(LektError::ProviderUnavailable {
        provider: String::new(),
        message: "answer stream ended without a terminal event".to_string(),
    })
}
