//! Scripted provider for engine tests.

use super::{Capabilities, ChatMessage, CompletionOptions, LlmProvider, ProviderFactory, TextStream};
use crate::config::ProviderConfig;
use crate::error::{LektError, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A recorded provider call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub user: String,
    pub options: CompletionOptions,
}

/// How a mock stream behaves after its fragments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StreamTail {
    /// Finish normally.
    Finish,
    /// Yield a provider error.
    Fail,
    /// Yield a rate-limit error.
    RateLimited,
    /// Never finish; only dropping the stream ends it.
    Hang,
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct MockProvider {
    replies: Mutex<VecDeque<String>>,
    default_reply: String,
    fragments: Vec<String>,
    tail: StreamTail,
    fail_requests: bool,
    capabilities: Capabilities,
    calls: AtomicUsize,
    recorded: Mutex<Vec<RecordedCall>>,
    stream_dropped: Arc<AtomicBool>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: "{}".to_string(),
            fragments: Vec::new(),
            tail: StreamTail::Finish,
            fail_requests: false,
            capabilities: Capabilities::default(),
            calls: AtomicUsize::new(0),
            recorded: Mutex::new(Vec::new()),
            stream_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replies returned by `complete`, in order; the last one repeats.
    pub fn with_replies(mut self, replies: &[&str]) -> Self {
        let queue: VecDeque<String> = replies.iter().map(|r| r.to_string()).collect();
        if let Some(last) = queue.back() {
            self.default_reply = last.clone();
        }
        self.replies = Mutex::new(queue);
        self
    }

    pub fn with_fragments(mut self, fragments: &[&str], tail: StreamTail) -> Self {
        self.fragments = fragments.iter().map(|f| f.to_string()).collect();
        self.tail = tail;
        self
    }

    /// Fail every request before any output.
    pub fn failing(mut self) -> Self {
        self.fail_requests = true;
        self
    }

    pub fn with_reasoning(mut self) -> Self {
        self.capabilities.reasoning = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn stream_dropped(&self) -> bool {
        self.stream_dropped.load(Ordering::SeqCst)
    }

    fn record(&self, system: &str, messages: &[ChatMessage], options: &CompletionOptions) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().unwrap().push(RecordedCall {
            system: system.to_string(),
            user: messages
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            options: options.clone(),
        });

        if self.fail_requests {
            return Err(unavailable("service down"));
        }
        Ok(())
    }
}

fn unavailable(message: &str) -> LektError {
    LektError::ProviderUnavailable {
        provider: "mock".to_string(),
        message: message.to_string(),
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> String {
        "mock".to_string()
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String> {
        self.record(system_prompt, messages, options)?;
        let reply = self.replies.lock().unwrap().pop_front();
        Ok(reply.unwrap_or_else(|| self.default_reply.clone()))
    }

    async fn stream(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<TextStream> {
        self.record(system_prompt, messages, options)?;

        let guard = DropFlag(self.stream_dropped.clone());
        let head = stream::iter(self.fragments.clone().into_iter().map(Ok));
        let tail: TextStream = match self.tail {
            StreamTail::Finish => Box::pin(stream::empty()),
            StreamTail::Fail => Box::pin(stream::once(async { Err(unavailable("connection reset")) })),
            StreamTail::RateLimited => Box::pin(stream::once(async {
                Err(LektError::RateLimited {
                    provider: "mock".to_string(),
                    message: "HTTP 429: slow down".to_string(),
                })
            })),
            StreamTail::Hang => Box::pin(stream::pending()),
        };

        Ok(Box::pin(head.chain(tail).map(move |item| {
            let _held = &guard;
            item
        })))
    }
}

/// Factory that always hands out the same mock and records the configs it saw.
pub struct MockFactory {
    provider: Arc<MockProvider>,
    configs: Mutex<Vec<ProviderConfig>>,
    missing_key: bool,
}

impl MockFactory {
    pub fn new(provider: Arc<MockProvider>) -> Self {
        Self {
            provider,
            configs: Mutex::new(Vec::new()),
            missing_key: false,
        }
    }

    /// Refuse to build providers, as when the API key is not set.
    pub fn without_credentials(mut self) -> Self {
        self.missing_key = true;
        self
    }

    pub fn configs(&self) -> Vec<ProviderConfig> {
        self.configs.lock().unwrap().clone()
    }
}

impl ProviderFactory for MockFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
        self.configs.lock().unwrap().push(config.clone());
        if self.missing_key {
            return Err(LektError::Authentication {
                provider: config.provider.to_string(),
                message: format!("{} not set", config.provider.api_key_env()),
            });
        }
        Ok(self.provider.clone())
    }
}
