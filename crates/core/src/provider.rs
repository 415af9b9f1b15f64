//! Completion provider trait: the abstraction over the external model API.
//!
//! The pipeline builds a [`CompletionRequest`] from the persona, the student
//! context, and the transcript, and hands it to whichever provider is wired
//! for the assistant. Providers report failures as [`UpstreamError`]; the
//! pipeline turns any failure into a canned fallback reply.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;
use crate::message::Role;

/// A server-side tool the model may use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    WebSearch,
    FileSearch { vector_store_ids: Vec<String> },
    CodeInterpreter,
}

/// One prior turn replayed to a stateless backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,

    /// Persona system prompt.
    pub instructions: String,

    /// The sanitized student message.
    pub input: String,

    /// Prior turns, oldest first. Empty for stateful backends.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryTurn>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<Capability>,

    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    /// Continuity reference from the previous successful exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,

    /// New continuity reference, if the backend issues one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    pub model: String,

    /// Set when the continuity reference was rejected and the request was
    /// resent without it.
    #[serde(default)]
    pub continuity_dropped: bool,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short name for logs (e.g. "responses", "chat").
    fn name(&self) -> &str;

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, UpstreamError>;
}

/// Decoded audio handed to a speech-to-text backend.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
    pub model: String,
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: AudioUpload) -> std::result::Result<String, UpstreamError>;
}
