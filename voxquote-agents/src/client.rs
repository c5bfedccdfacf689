use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One request-response exchange with the inference backend
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user_content: String,
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
}

/// Errors from the inference backend.
///
/// Only `RateLimited` and `Unavailable` are transient; the retry policy
/// lives in the caller, never here.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Rate limited by inference backend")]
    RateLimited,

    #[error("Inference backend temporarily unavailable (HTTP {0})")]
    Unavailable(u16),

    #[error("Inference backend returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Inference backend returned no content")]
    EmptyResponse,
}

impl InferenceError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            InferenceError::RateLimited | InferenceError::Unavailable(_)
        )
    }
}

/// The extraction engine's view of the language model
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, InferenceError>;
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<MessageBody<'a>>,
}

#[derive(Debug, Serialize)]
struct MessageBody<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

/// HTTP implementation against a messages-style inference API
pub struct HttpInferenceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpInferenceClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, InferenceError> {
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: &request.system,
            messages: vec![MessageBody {
                role: "user",
                content: &request.user_content,
            }],
        };

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!("Inference backend returned {}: {}", status, message);
            return Err(match status.as_u16() {
                429 => InferenceError::RateLimited,
                500 | 502 | 503 | 529 => InferenceError::Unavailable(status.as_u16()),
                code => InferenceError::Api {
                    status: code,
                    message,
                },
            });
        }

        let parsed: MessagesResponse = response.json().await?;
        let content: String = parsed
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if content.trim().is_empty() {
            return Err(InferenceError::EmptyResponse);
        }

        Ok(CompletionResponse { content })
    }
}
