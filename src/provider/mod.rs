//! Language model provider abstraction for Lekt.
//!
//! Every backend is reached through the [`LlmProvider`] trait. Backends differ
//! in endpoint, credential, default model and optional features; those
//! differences are described by [`ProviderKind`] and [`Capabilities`] so that
//! callers ask "does this provider support reasoning?" instead of matching on
//! provider names.

mod chat_completions;
#[cfg(test)]
pub(crate) mod mock;
mod wire;

pub use chat_completions::ChatCompletionsProvider;

use crate::config::ProviderConfig;
use crate::error::{LektError, Result};
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// Lazy sequence of answer text fragments, in provider order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Known provider identities.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// NVIDIA hosted inference (Nemotron models, supports thinking budgets).
    #[default]
    Nvidia,
    /// Groq LPU inference.
    Groq,
    /// OpenAI.
    OpenAi,
}

impl ProviderKind {
    /// All providers, in display order.
    pub fn all() -> &'static [ProviderKind] {
        &[ProviderKind::Nvidia, ProviderKind::Groq, ProviderKind::OpenAi]
    }

    /// Model used when the configuration does not name one.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Nvidia => "nvidia/nvidia-nemotron-nano-9b-v2",
            ProviderKind::Groq => "llama-3.3-70b-versatile",
            ProviderKind::OpenAi => "gpt-4o-mini",
        }
    }

    /// OpenAI-compatible API root.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Nvidia => "https://integrate.api.nvidia.com/v1",
            ProviderKind::Groq => "https://api.groq.com/openai/v1",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Nvidia => "NVIDIA_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        }
    }

    /// Optional features this provider understands.
    pub fn capabilities(&self) -> Capabilities {
        match self {
            ProviderKind::Nvidia => Capabilities { reasoning: true },
            ProviderKind::Groq | ProviderKind::OpenAi => Capabilities { reasoning: false },
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = LektError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nvidia" => Ok(ProviderKind::Nvidia),
            "groq" => Ok(ProviderKind::Groq),
            "openai" => Ok(ProviderKind::OpenAi),
            _ => Err(LektError::InvalidConfig(format!(
                "Unknown provider '{}' (expected nvidia, groq or openai)",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Nvidia => write!(f, "nvidia"),
            ProviderKind::Groq => write!(f, "groq"),
            ProviderKind::OpenAi => write!(f, "openai"),
        }
    }
}

/// Optional provider features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Extended reasoning ("thinking") before answering.
    pub reasoning: bool,
}

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// A conversation message sent after the system prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Per-call generation options.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    /// Sampling randomness.
    pub temperature: f32,
    /// Hard cap on generated tokens.
    pub max_output_tokens: u32,
    /// Enable extended reasoning if the provider supports it; ignored otherwise.
    pub reasoning: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.6,
            max_output_tokens: 2048,
            reasoning: false,
        }
    }
}

impl CompletionOptions {
    /// Same options with a different temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Drop flags the provider cannot honour.
    pub fn effective_for(&self, capabilities: Capabilities) -> CompletionOptions {
        let mut options = self.clone();
        if options.reasoning && !capabilities.reasoning {
            debug!("Provider does not support reasoning, dropping flag");
            options.reasoning = false;
        }
        options
    }
}

/// Uniform interface over LLM backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identity, recorded with generated summaries.
    fn name(&self) -> String;

    /// Model used for requests.
    fn model(&self) -> &str;

    /// Optional features supported by this provider.
    fn capabilities(&self) -> Capabilities;

    /// Generate a full completion.
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String>;

    /// Generate a completion as a lazy sequence of text deltas.
    ///
    /// Dropping the returned stream closes the underlying request.
    async fn stream(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<TextStream>;
}

/// Builds a provider for the current configuration snapshot.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>>;
}

/// API keys, read once at startup.
#[derive(Clone, Default)]
pub struct Credentials {
    keys: HashMap<ProviderKind, String>,
}

impl Credentials {
    /// Collect keys for every known provider from the environment.
    pub fn from_env() -> Self {
        let keys = ProviderKind::all()
            .iter()
            .filter_map(|kind| {
                std::env::var(kind.api_key_env())
                    .ok()
                    .filter(|key| !key.trim().is_empty())
                    .map(|key| (*kind, key))
            })
            .collect();
        Self { keys }
    }

    /// Set a key explicitly.
    pub fn with_key(mut self, kind: ProviderKind, key: impl Into<String>) -> Self {
        self.keys.insert(kind, key.into());
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&str> {
        self.keys.get(&kind).map(String::as_str)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let providers: Vec<String> = self.keys.keys().map(|k| k.to_string()).collect();
        f.debug_struct("Credentials")
            .field("providers", &providers)
            .finish()
    }
}

/// Factory for the HTTP chat-completions providers.
pub struct HttpProviderFactory {
    http: reqwest::Client,
    credentials: Credentials,
    base_url_override: Option<String>,
}

impl HttpProviderFactory {
    pub fn new(http: reqwest::Client, credentials: Credentials) -> Self {
        Self {
            http,
            credentials,
            base_url_override: None,
        }
    }

    /// Send requests to this API root instead of the provider default.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url_override = base_url;
        self
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
        let provider = ChatCompletionsProvider::new(
            config.provider,
            &config.model,
            self.credentials.get(config.provider),
            self.base_url_override.as_deref(),
            self.http.clone(),
        )?;
        Ok(Arc::new(provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_roundtrip() {
        for kind in ProviderKind::all() {
            let parsed: ProviderKind = kind.to_string().parse().unwrap();
            assert_eq!(&parsed, kind);
        }
        assert!(matches!(
            "anthropic".parse::<ProviderKind>(),
            Err(LektError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_serde_identity_matches_display() {
        let json = serde_json::to_string(&ProviderKind::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
    }

    #[test]
    fn test_unsupported_reasoning_is_dropped() {
        let options = CompletionOptions {
            reasoning: true,
            ..Default::default()
        };

        let groq = options.effective_for(ProviderKind::Groq.capabilities());
        assert!(!groq.reasoning);

        let nvidia = options.effective_for(ProviderKind::Nvidia.capabilities());
        assert!(nvidia.reasoning);
    }

    #[test]
    fn test_factory_requires_credentials() {
        let factory = HttpProviderFactory::new(reqwest::Client::new(), Credentials::default());
        let config = ProviderConfig {
            provider: ProviderKind::Groq,
            model: "llama-3.3-70b-versatile".to_string(),
            reasoning: false,
            temperature: 0.6,
            max_output_tokens: 512,
        };

        let err = factory.create(&config).err().unwrap();
        assert!(matches!(err, LektError::Authentication { .. }));

        let factory = HttpProviderFactory::new(
            reqwest::Client::new(),
            Credentials::default().with_key(ProviderKind::Groq, "gsk-test"),
        );
        let provider = factory.create(&config).unwrap();
        assert_eq!(provider.name(), "groq");
        assert_eq!(provider.model(), "llama-3.3-70b-versatile");
    }
}
