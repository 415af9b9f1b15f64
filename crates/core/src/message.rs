//! Transcript messages.
//!
//! The transcript is append-only: one row per turn on each side of an
//! exchange, never mutated or deleted by the chat pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assistant::AssistantId;
use crate::user::UserId;

/// The role of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// A single persisted chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub user_id: UserId,
    pub assistant: AssistantId,
    pub role: Role,
    pub content: String,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a new inbound (student) message.
    pub fn user(user_id: UserId, assistant: AssistantId, content: impl Into<String>) -> Self {
        Self::new(user_id, assistant, Role::User, content)
    }

    /// Create a new outbound (assistant) message.
    pub fn assistant(
        user_id: UserId,
        assistant: AssistantId,
        content: impl Into<String>,
    ) -> Self {
        Self::new(user_id, assistant, Role::Assistant, content)
    }

    fn new(
        user_id: UserId,
        assistant: AssistantId,
        role: Role,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            assistant,
            role,
            content: content.into(),
            metadata: serde_json::Map::new(),
            created_at: Utc::now(),
        }
    }

    /// Attach a metadata entry (builder style).
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
