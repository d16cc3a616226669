use crate::error::CompletionError;
use crate::models::Turn;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MAX_TOKENS: usize = 2_048;

/// A chat-style text generator: a system instruction plus alternating
/// user/assistant turns in, one reply out.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, system: &str, messages: &[Turn]) -> Result<String, CompletionError>;
}

pub struct AnthropicClient {
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: usize,
}

impl AnthropicClient {
    pub fn new(api_key: &str, model: impl Into<String>, timeout: Duration) -> Result<Self, CompletionError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(CompletionError::Config("missing Anthropic API key".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|_| CompletionError::Config("invalid Anthropic API key".to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: ANTHROPIC_MESSAGES_URL.to_string(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }
}

#[async_trait]
impl CompletionModel for AnthropicClient {
    async fn complete(&self, system: &str, messages: &[Turn]) -> Result<String, CompletionError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: messages
                .iter()
                .map(|turn| RequestMessage {
                    role: turn.role.as_str(),
                    content: &turn.content,
                })
                .collect(),
        };

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(CompletionError::BackendResponse {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = response.json().await?;
        let answer = collect_text(parsed)?;
        debug!(model = %self.model, chars = answer.len(), "completion received");
        Ok(answer)
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    system: &'a str,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

fn collect_text(response: MessagesResponse) -> Result<String, CompletionError> {
    let answer = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ResponseBlock::Text { text } => Some(text),
            ResponseBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    if answer.trim().is_empty() {
        return Err(CompletionError::EmptyResponse);
    }
    Ok(answer)
}
