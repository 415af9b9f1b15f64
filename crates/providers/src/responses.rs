//! Client for the stateful Responses endpoint.
//!
//! Conversation continuity is carried server-side: each successful call
//! returns a response id that the next call passes as
//! `previous_response_id`. A stale id is rejected with HTTP 400; the client
//! then resends the same request once without it.

use std::time::Duration;

use async_trait::async_trait;
use hikewise_core::provider::{
    Capability, CompletionProvider, CompletionRequest, CompletionResponse, Usage,
};
use hikewise_core::{Role, UpstreamError};
use serde::Serialize;
use tracing::{debug, warn};

use crate::extract::{ResponsesBody, extract_text};
use crate::http::{build_client, network_error, normalize_base_url, read_json};

pub struct ResponsesProvider {
    base_url: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: Input<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSpec<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_response_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Input<'a> {
    Text(&'a str),
    Messages(Vec<InputMessage<'a>>),
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ToolSpec<'a> {
    WebSearch,
    FileSearch { vector_store_ids: &'a [String] },
    CodeInterpreter { container: Container },
}

#[derive(Debug, Serialize)]
struct Container {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl<'a> From<&'a Capability> for ToolSpec<'a> {
    fn from(capability: &'a Capability) -> Self {
        match capability {
            Capability::WebSearch => Self::WebSearch,
            Capability::FileSearch { vector_store_ids } => Self::FileSearch { vector_store_ids },
            Capability::CodeInterpreter => Self::CodeInterpreter {
                container: Container { kind: "auto" },
            },
        }
    }
}

impl<'a> ResponsesRequest<'a> {
    fn from_request(request: &'a CompletionRequest, previous_response_id: Option<&'a str>) -> Self {
        let input = if request.history.is_empty() {
            Input::Text(&request.input)
        } else {
            let mut messages: Vec<InputMessage<'a>> = request
                .history
                .iter()
                .map(|turn| InputMessage {
                    role: turn.role.as_str(),
                    content: &turn.content,
                })
                .collect();
            messages.push(InputMessage {
                role: Role::User.as_str(),
                content: &request.input,
            });
            Input::Messages(messages)
        };

        Self {
            model: &request.model,
            instructions: &request.instructions,
            input,
            tools: request.capabilities.iter().map(ToolSpec::from).collect(),
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
            previous_response_id,
        }
    }
}

impl ResponsesProvider {
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

    async fn send(&self, body: &ResponsesRequest<'_>) -> Result<ResponsesBody, UpstreamError> {
        let url = format!("{}/responses", self.base_url);
        debug!(
            model = body.model,
            tools = body.tools.len(),
            continued = body.previous_response_id.is_some(),
            "Sending responses request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| network_error(e, self.timeout))?;

        read_json(response, "responses", self.timeout).await
    }
}

#[async_trait]
impl CompletionProvider for ResponsesProvider {
    fn name(&self) -> &str {
        "responses"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, UpstreamError> {
        if self.api_key.is_empty() {
            return Err(UpstreamError::NotConfigured("responses api key".into()));
        }

        let previous = request.previous_response_id.as_deref();
        let first = self
            .send(&ResponsesRequest::from_request(&request, previous))
            .await;

        let (body, continuity_dropped) = match first {
            Ok(body) => (body, false),
            Err(UpstreamError::Status {
                status_code: 400,
                message,
            }) if previous.is_some() => {
                warn!(
                    status = 400,
                    error = %message,
                    "Continuity reference rejected, retrying without it"
                );
                let body = self
                    .send(&ResponsesRequest::from_request(&request, None))
                    .await?;
                (body, true)
            }
            Err(e) => return Err(e),
        };

        let usage = body.usage.map(|u| Usage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
            total_tokens: u.total_tokens,
        });
        let model = body.model.clone().unwrap_or_else(|| request.model.clone());
        let response_id = body.id.clone().filter(|id| !id.is_empty());
        let text = extract_text(&body).into_text();

        Ok(CompletionResponse {
            text,
            response_id,
            usage,
            model,
            continuity_dropped,
        })
    }
}
