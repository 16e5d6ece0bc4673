//! OpenAI-compatible chat completions provider.
//!
//! NVIDIA, Groq and OpenAI all expose `POST {base}/chat/completions` with the
//! same request shape and SSE streaming format, so one client serves all of
//! them; the [`ProviderKind`] supplies endpoint, credential and extensions.

use super::wire::{ChatRequest, ChatResponse, ChatStreamChunk, ErrorEnvelope};
use super::{
    Capabilities, ChatMessage, CompletionOptions, LlmProvider, ProviderKind, Role, TextStream,
};
use crate::error::{LektError, Result};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, instrument, warn};

/// Thinking budget requested from NVIDIA reasoning models.
const MIN_THINKING_TOKENS: u32 = 1024;
const MAX_THINKING_TOKENS: u32 = 2048;

/// Chat completions client for one provider and model.
pub struct ChatCompletionsProvider {
    kind: ProviderKind,
    model: String,
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl ChatCompletionsProvider {
    /// Create a provider client.
    ///
    /// Fails with [`LektError::Authentication`] when no API key is available,
    /// so a misconfigured provider is reported before any request is made.
    pub fn new(
        kind: ProviderKind,
        model: &str,
        api_key: Option<&str>,
        base_url: Option<&str>,
        http: reqwest::Client,
    ) -> Result<Self> {
        let api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| LektError::Authentication {
                provider: kind.to_string(),
                message: format!(
                    "{} not set. Set it with: export {}='...'",
                    kind.api_key_env(),
                    kind.api_key_env()
                ),
            })?;

        Ok(Self {
            kind,
            model: model.to_string(),
            api_key: api_key.to_string(),
            base_url: base_url
                .unwrap_or_else(|| kind.default_base_url())
                .trim_end_matches('/')
                .to_string(),
            http,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_messages(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut out: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(messages.len() + 1);

        out.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt.to_string())
                .build()
                .map_err(|e| LektError::InvalidInput(e.to_string()))?
                .into(),
        );

        for message in messages {
            let built: ChatCompletionRequestMessage = match message.role {
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(message.content.clone())
                    .build()
                    .map_err(|e| LektError::InvalidInput(e.to_string()))?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(message.content.clone())
                    .build()
                    .map_err(|e| LektError::InvalidInput(e.to_string()))?
                    .into(),
            };
            out.push(built);
        }

        Ok(out)
    }

    fn build_request<'a>(
        &'a self,
        system_prompt: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        stream: bool,
    ) -> Result<ChatRequest<'a>> {
        let options = options.effective_for(self.capabilities());

        let mut extra = serde_json::Map::new();
        if options.reasoning {
            extra.insert("min_thinking_tokens".to_string(), json!(MIN_THINKING_TOKENS));
            extra.insert("max_thinking_tokens".to_string(), json!(MAX_THINKING_TOKENS));
        }

        let top_p = match self.kind {
            ProviderKind::Nvidia => Some(0.95),
            ProviderKind::Groq | ProviderKind::OpenAi => None,
        };

        Ok(ChatRequest {
            model: &self.model,
            messages: self.build_messages(system_prompt, messages)?,
            temperature: options.temperature,
            max_tokens: options.max_output_tokens,
            top_p,
            stream,
            extra,
        })
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.unavailable(format!("request failed: {}", e)))?;

        self.check_status(response).await
    }

    /// Map non-success statuses onto the error taxonomy.
    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.chars().take(300).collect());
        let message = format!("HTTP {}: {}", status.as_u16(), message);

        warn!(provider = %self.kind, status = status.as_u16(), "Provider request rejected");

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LektError::Authentication {
                provider: self.kind.to_string(),
                message,
            },
            StatusCode::TOO_MANY_REQUESTS => LektError::RateLimited {
                provider: self.kind.to_string(),
                message,
            },
            _ => self.unavailable(message),
        })
    }

    fn unavailable(&self, message: String) -> LektError {
        unavailable(&self.kind.to_string(), message)
    }
}

#[async_trait]
impl LlmProvider for ChatCompletionsProvider {
    fn name(&self) -> String {
        self.kind.to_string()
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn capabilities(&self) -> Capabilities {
        self.kind.capabilities()
    }

    #[instrument(skip_all, fields(provider = %self.kind, model = %self.model))]
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String> {
        let request = self.build_request(system_prompt, messages, options, false)?;
        let response = self.send(&request).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| self.unavailable(format!("invalid response body: {}", e)))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| self.unavailable("empty response from model".to_string()))?;

        debug!("Completion returned {} chars", content.len());
        Ok(content)
    }

    #[instrument(skip_all, fields(provider = %self.kind, model = %self.model))]
    async fn stream(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<TextStream> {
        let request = self.build_request(system_prompt, messages, options, true)?;
        let response = self.send(&request).await?;

        let provider = self.kind.to_string();
        let events = Box::pin(response.bytes_stream().eventsource());

        // The stream only finishes cleanly on `[DONE]`; a body that ends early
        // or a chunk that cannot be read ends it with an error instead.
        let fragments = stream::unfold(Some(events), move |state| {
            let provider = provider.clone();
            async move {
                let mut events = state?;
                loop {
                    let event = match events.next().await {
                        Some(Ok(event)) => event,
                        Some(Err(e)) => {
                            let message = format!("stream interrupted: {}", e);
                            return Some((Err(unavailable(&provider, message)), None));
                        }
                        None => {
                            let message = "stream ended before [DONE]".to_string();
                            return Some((Err(unavailable(&provider, message)), None));
                        }
                    };

                    match parse_event(&event.data) {
                        StreamEvent::Done => return None,
                        StreamEvent::Skip => continue,
                        StreamEvent::Text(text) => return Some((Ok(text), Some(events))),
                        StreamEvent::Failed(message) => {
                            return Some((Err(unavailable(&provider, message)), None))
                        }
                    }
                }
            }
        });

        Ok(Box::pin(fragments))
    }
}

/// What one SSE event contributes to the answer.
#[derive(Debug, PartialEq)]
enum StreamEvent {
    /// `[DONE]` terminator.
    Done,
    /// Answer text.
    Text(String),
    /// Keepalive, role-only or reasoning delta.
    Skip,
    Failed(String),
}

fn parse_event(data: &str) -> StreamEvent {
    let data = data.trim();
    if data.is_empty() {
        return StreamEvent::Skip;
    }
    if data == "[DONE]" {
        return StreamEvent::Done;
    }

    let chunk: ChatStreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!(error = %e, "Unreadable stream chunk");
            return StreamEvent::Failed(format!("malformed stream chunk: {}", e));
        }
    };

    if let Some(error) = chunk.error {
        return StreamEvent::Failed(error.message);
    }

    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|text| !text.is_empty())
        .map_or(StreamEvent::Skip, StreamEvent::Text)
}

fn unavailable(provider: &str, message: String) -> LektError {
    LektError::ProviderUnavailable {
        provider: provider.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(kind: ProviderKind, server: &MockServer) -> ChatCompletionsProvider {
        ChatCompletionsProvider::new(
            kind,
            kind.default_model(),
            Some("test-key"),
            Some(&server.uri()),
            reqwest::Client::new(),
        )
        .unwrap()
    }

    fn reasoning_options() -> CompletionOptions {
        CompletionOptions {
            temperature: 0.2,
            max_output_tokens: 256,
            reasoning: true,
        }
    }

    async fn last_request_body(server: &MockServer) -> serde_json::Value {
        let requests = server.received_requests().await.unwrap();
        serde_json::from_slice(&requests.last().unwrap().body).unwrap()
    }

    #[test]
    fn test_missing_key_fails_at_construction() {
        let result = ChatCompletionsProvider::new(
            ProviderKind::Nvidia,
            "m",
            Some("   "),
            None,
            reqwest::Client::new(),
        );
        assert!(matches!(result, Err(LektError::Authentication { .. })));
    }

    #[tokio::test]
    async fn test_complete_sends_reasoning_budget_for_nvidia() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Recursion calls itself."}}]
            })))
            .mount(&server)
            .await;

        let nvidia = provider(ProviderKind::Nvidia, &server);
        let answer = nvidia
            .complete("system", &[ChatMessage::user("What is recursion?")], &reasoning_options())
            .await
            .unwrap();
        assert_eq!(answer, "Recursion calls itself.");

        let body = last_request_body(&server).await;
        assert_eq!(body["model"], "nvidia/nvidia-nemotron-nano-9b-v2");
        assert_eq!(body["stream"], false);
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["min_thinking_tokens"], 1024);
        assert_eq!(body["max_thinking_tokens"], 2048);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "What is recursion?");
    }

    #[tokio::test]
    async fn test_reasoning_flag_ignored_for_groq() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .mount(&server)
            .await;

        let groq = provider(ProviderKind::Groq, &server);
        let answer = groq
            .complete("system", &[ChatMessage::user("hi")], &reasoning_options())
            .await
            .unwrap();
        assert_eq!(answer, "ok");

        let body = last_request_body(&server).await;
        assert!(body.get("min_thinking_tokens").is_none());
        assert!(body.get("top_p").is_none());
    }

    #[tokio::test]
    async fn test_status_codes_map_to_error_taxonomy() {
        let cases = [
            (401, "auth"),
            (429, "rate"),
            (503, "unavailable"),
        ];

        for (status, expected) in cases {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                    "error": {"message": "nope"}
                })))
                .mount(&server)
                .await;

            let openai = provider(ProviderKind::OpenAi, &server);
            let err = openai
                .complete("system", &[ChatMessage::user("hi")], &CompletionOptions::default())
                .await
                .unwrap_err();

            match expected {
                "auth" => assert!(matches!(err, LektError::Authentication { .. })),
                "rate" => assert!(matches!(err, LektError::RateLimited { .. })),
                _ => assert!(matches!(err, LektError::ProviderUnavailable { .. })),
            }
            assert!(err.to_string().contains("nope"));
        }
    }

    #[tokio::test]
    async fn test_stream_yields_fragments_in_order() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"thinking...\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Lists \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"and \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"dicts\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let nvidia = provider(ProviderKind::Nvidia, &server);
        let stream = nvidia
            .stream("system", &[ChatMessage::user("hi")], &reasoning_options())
            .await
            .unwrap();

        let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;
        assert_eq!(fragments, vec!["Lists ", "and ", "dicts"]);

        let body = last_request_body(&server).await;
        assert_eq!(body["stream"], true);
    }

    #[tokio::test]
    async fn test_stream_surfaces_inline_error() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n",
            "data: {\"error\":{\"message\":\"model overloaded\"}}\n\n",
        );
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let groq = provider(ProviderKind::Groq, &server);
        let results: Vec<Result<String>> = groq
            .stream("system", &[ChatMessage::user("hi")], &CompletionOptions::default())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), "partial");
        assert!(matches!(
            results[1],
            Err(LektError::ProviderUnavailable { ref message, .. }) if message == "model overloaded"
        ));
    }

    async fn collect_stream(body: &'static str) -> Vec<Result<String>> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        provider(ProviderKind::OpenAi, &server)
            .stream("system", &[ChatMessage::user("hi")], &CompletionOptions::default())
            .await
            .unwrap()
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_stream_closed_without_done_is_an_error() {
        let results =
            collect_stream("data: {\"choices\":[{\"delta\":{\"content\":\"Lists are\"}}]}\n\n").await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), "Lists are");
        assert!(matches!(
            results[1],
            Err(LektError::ProviderUnavailable { ref message, .. }) if message.contains("[DONE]")
        ));
    }

    #[tokio::test]
    async fn test_stream_malformed_chunk_is_an_error() {
        let results = collect_stream(concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Recursion\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" again\"}}]}\n\n",
            "data: [DONE]\n\n",
        ))
        .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), "Recursion");
        assert!(matches!(
            results[1],
            Err(LektError::ProviderUnavailable { ref message, .. }) if message.contains("malformed")
        ));
    }

    #[tokio::test]
    async fn test_stream_ignores_keepalive_comments() {
        let results = collect_stream(concat!(
            ": keepalive\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
            ": keepalive\n\n",
            "data: [DONE]\n\n",
        ))
        .await;

        let fragments: Vec<String> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(fragments, vec!["ok"]);
    }

    #[test]
    fn test_parse_event() {
        assert_eq!(parse_event(" [DONE] "), StreamEvent::Done);
        assert_eq!(parse_event(""), StreamEvent::Skip);
        assert_eq!(
            parse_event(r#"{"choices":[{"delta":{"reasoning_content":"hmm"}}]}"#),
            StreamEvent::Skip
        );
        assert_eq!(
            parse_event(r#"{"choices":[{"delta":{"content":"hi"}}]}"#),
            StreamEvent::Text("hi".to_string())
        );
        assert!(matches!(parse_event("{not json"), StreamEvent::Failed(_)));
    }

    #[tokio::test]
    async fn test_stream_rate_limited_before_first_fragment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("too many requests"))
            .mount(&server)
            .await;

        let groq = provider(ProviderKind::Groq, &server);
        let result = groq
            .stream("system", &[ChatMessage::user("hi")], &CompletionOptions::default())
            .await;
        assert!(matches!(result, Err(LektError::RateLimited { .. })));
    }
}
