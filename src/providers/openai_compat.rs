//! OpenAI-compatible provider
//!
//! Works with any API that implements the OpenAI chat completions format,
//! including the Gaia nodes serving the twin and the Korean translator.
//! Requests are always sent with `stream: true`; the answer may come back
//! either as an event stream or as a single JSON completion, and both are
//! assembled the same way.

use std::convert::Infallible;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::conversation::Message;

use super::stream::{collect_reply, sse_frames};
use super::{ChatBackend, ProviderError, Reply};

/// OpenAI-compatible chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

/// Non-streaming chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Error response from API
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone)]
pub struct OpenAICompatConfig {
    /// Base URL for the API (e.g., https://korean.gaia.domains/v1)
    pub base_url: String,
    /// API key (optional for open nodes)
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    pub temperature: f32,
    /// Generation cap
    pub max_tokens: u32,
    /// Also send `?stream=true`, for servers that only read it from the query
    pub stream_query_param: bool,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl OpenAICompatConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 500,
            stream_query_param: false,
            timeout_secs: 120,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_stream_query_param(mut self, enabled: bool) -> Self {
        self.stream_query_param = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// OpenAI-compatible API provider
pub struct OpenAICompatProvider {
    config: OpenAICompatConfig,
    client: Client,
}

impl OpenAICompatProvider {
    /// Create a new provider with the given configuration
    pub fn new(config: OpenAICompatConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn build_request(&self, messages: &[Message]) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(ChatMessage::from).collect(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: true,
        }
    }

    /// Send a streaming chat completion request and assemble the reply
    pub async fn chat(&self, messages: &[Message]) -> Result<Reply, ProviderError> {
        let url = self.config.endpoint();
        let request = self.build_request(messages);

        let mut req_builder = self.client.post(&url);

        if self.config.stream_query_param {
            req_builder = req_builder.query(&[("stream", "true")]);
        }

        // Add authorization if API key is provided
        if let Some(ref api_key) = self.config.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        tracing::debug!(
            "POST {} model={} turns={}",
            url,
            request.model,
            request.messages.len()
        );

        let response = req_builder
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Try to parse error response
            if let Ok(error_resp) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(ProviderError::Transport(format!(
                    "API error ({}): {}",
                    status, error_resp.error.message
                )));
            }
            return Err(ProviderError::Transport(format!("HTTP {}: {}", status, body)));
        }

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));

        if is_event_stream {
            return collect_reply(sse_frames(response.bytes_stream())).await;
        }

        let body = response.text().await?;
        parse_body(&body).await
    }
}

#[async_trait]
impl ChatBackend for OpenAICompatProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, messages: &[Message]) -> Result<Reply, ProviderError> {
        self.chat(messages).await
    }
}

/// Assemble a reply from a fully buffered body.
///
/// Some servers send server-sent events without the matching content type,
/// so `data:` bodies go through the same event parser as a live stream;
/// anything else must be a single completion object.
async fn parse_body(body: &str) -> Result<Reply, ProviderError> {
    let trimmed = body.trim_start();

    if trimmed.starts_with("data:") {
        // a final blank line dispatches an event the body left unterminated
        let parts: [Result<&[u8], Infallible>; 2] =
            [Ok(trimmed.as_bytes()), Ok(&b"\n\n"[..])];
        return collect_reply(sse_frames(stream::iter(parts))).await;
    }

    if trimmed.is_empty() {
        return Err(ProviderError::Decode("empty response body".to_string()));
    }

    let completion: ChatCompletionResponse = serde_json::from_str(trimmed).map_err(|e| {
        ProviderError::Decode(format!("Failed to parse response: {} - Body: {}", e, body))
    })?;

    let content = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Decode("No choices in response".to_string()))?
        .message
        .content
        .unwrap_or_default();

    let content = content.trim();
    if content.is_empty() {
        Err(ProviderError::EmptyResult)
    } else {
        Ok(Reply::new(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    fn provider(base_url: String) -> OpenAICompatProvider {
        OpenAICompatProvider::new(OpenAICompatConfig::new(base_url, "test-model").with_timeout(5))
            .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = OpenAICompatConfig::new("http://localhost:8080/v1/", "llama")
            .with_api_key(Some("  ".to_string()));
        assert!(config.api_key.is_none());
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 500);
        assert_eq!(config.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_message_conversion() {
        let chat_msg = ChatMessage::from(&Message::user("Hello"));
        assert_eq!(chat_msg.role, "user");
        assert_eq!(chat_msg.content, "Hello");
    }

    #[test]
    fn test_request_shape() {
        let provider = provider("http://localhost:1/v1".into());
        let request = provider.build_request(&[Message::user("Hello")]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "test-model");
        assert_eq!(value["stream"], true);
        assert_eq!(value["max_tokens"], 500);
        assert_eq!(value["messages"][0]["role"], "user");
        assert!((value["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_parse_body_variants() {
        assert_eq!(
            parse_body(r#"{"choices":[{"message":{"role":"assistant","content":" 안녕 "}}]}"#)
                .await
                .unwrap(),
            Reply::new("안녕")
        );
        assert!(matches!(
            parse_body(r#"{"choices":[{"message":{"role":"assistant","content":""}}]}"#).await,
            Err(ProviderError::EmptyResult)
        ));
        assert!(matches!(
            parse_body(r#"{"choices":[]}"#).await,
            Err(ProviderError::Decode(_))
        ));
        assert!(matches!(parse_body("<html>").await, Err(ProviderError::Decode(_))));
        assert!(matches!(parse_body("").await, Err(ProviderError::Decode(_))));
    }

    #[tokio::test]
    async fn test_buffered_event_body_uses_event_framing() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":\n",
            "data: {\"content\":\"b\"}}]}\n\n",
            "data: oops\n\n",
            "data: [DONE]",
        );
        let reply = parse_body(body).await.unwrap();
        assert_eq!(reply.text, "ab");
        assert_eq!(reply.skipped, 1);
    }

    #[tokio::test]
    async fn test_streaming_round_trip() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let seen_in_handler = seen.clone();

        let router = Router::new().route(
            "/v1/chat/completions",
            post(move |Json(body): Json<Value>| {
                let seen = seen_in_handler.clone();
                async move {
                    *seen.lock().unwrap() = Some(body);
                    let sse = concat!(
                        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
                        "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
                        "data: not-json\n\n",
                        "data: {\"choices\":[{\"delta\":{\"content\":\" there.\"}}]}\n\n",
                        "data: [DONE]\n\n",
                    );
                    ([(header::CONTENT_TYPE, "text/event-stream")], sse)
                }
            }),
        );
        let base_url = serve(router).await;

        let reply = provider(base_url).chat(&[Message::user("Hello")]).await.unwrap();
        assert_eq!(reply.text, "Hi there.");
        assert_eq!(reply.skipped, 1);

        let body = seen.lock().unwrap().take().unwrap();
        assert_eq!(body["messages"][0]["content"], "Hello");
        assert_eq!(body["stream"], true);
    }

    #[tokio::test]
    async fn test_json_response_and_stream_query() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(
                |axum::extract::RawQuery(query): axum::extract::RawQuery| async move {
                    let content = if query.as_deref() == Some("stream=true") {
                        "query seen"
                    } else {
                        "no query"
                    };
                    Json(serde_json::json!({
                        "choices": [{"message": {"role": "assistant", "content": content}}]
                    }))
                },
            ),
        );
        let base_url = serve(router).await;

        let config = OpenAICompatConfig::new(base_url, "ko").with_stream_query_param(true);
        let provider = OpenAICompatProvider::new(config).unwrap();
        let reply = provider.complete(&[Message::user("x")]).await.unwrap();
        assert_eq!(reply.text, "query seen");
    }

    #[tokio::test]
    async fn test_http_error_is_transport() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(serde_json::json!({"error": {"message": "model is loading"}})),
                )
                    .into_response()
            }),
        );
        let base_url = serve(router).await;

        let err = provider(base_url).chat(&[Message::user("x")]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport(ref msg) if msg.contains("model is loading")));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport() {
        // bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = provider(format!("http://{}/v1", addr))
            .chat(&[Message::user("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
    }
}
