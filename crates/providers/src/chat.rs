//! Client for the stateless chat-completions endpoint.
//!
//! No server-side continuity: the caller supplies prior turns in
//! `CompletionRequest::history` and they are replayed between the system
//! prompt and the new user message.

use std::time::Duration;

use async_trait::async_trait;
use hikewise_core::provider::{CompletionProvider, CompletionRequest, CompletionResponse, Usage};
use hikewise_core::{Role, UpstreamError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{build_client, network_error, normalize_base_url, read_json};

pub struct ChatCompletionsProvider {
    base_url: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl ChatCompletionsProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        Ok(Self {
            base_url: normalize_base_url(&base_url.into()),
            api_key: api_key.into(),
            timeout,
            client: build_client(timeout)?,
        })
    }

    /// System prompt, then history oldest first, then the new message.
    fn to_api_messages(request: &CompletionRequest) -> Vec<ApiMessage<'_>> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ApiMessage {
            role: "system",
            content: &request.instructions,
        });
        messages.extend(request.history.iter().map(|turn| ApiMessage {
            role: turn.role.as_str(),
            content: &turn.content,
        }));
        messages.push(ApiMessage {
            role: Role::User.as_str(),
            content: &request.input,
        });
        messages
    }
}

#[async_trait]
impl CompletionProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        "chat"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, UpstreamError> {
        if self.api_key.is_empty() {
            return Err(UpstreamError::NotConfigured("chat api key".into()));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let body = ApiRequest {
            model: &request.model,
            messages: Self::to_api_messages(&request),
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };

        debug!(
            model = %request.model,
            history = request.history.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(e, self.timeout))?;

        let api_response: ApiResponse = read_json(response, "chat", self.timeout).await?;

        let text = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(UpstreamError::EmptyCompletion)?;

        let usage = api_response.usage.map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CompletionResponse {
            text,
            response_id: None,
            usage,
            model: api_response.model.unwrap_or(request.model),
            continuity_dropped: false,
        })
    }
}

// --- OpenAI chat API types ---

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}
