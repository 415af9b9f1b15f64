//! The payload returned by `send_message`.
//!
//! Every outcome, including failures, is a `SendMessageResponse`. Absent
//! fields are omitted from the JSON form.

use hikewise_core::Tier;
use serde::{Deserialize, Serialize};

pub const AUTH_FAILED_CODE: &str = "Authentication failed";
pub const ACCESS_DENIED_CODE: &str = "ACCESS_DENIED";
pub const MESSAGE_TOO_LONG_CODE: &str = "MESSAGE_TOO_LONG";

pub(crate) const AUTH_FAILED_REPLY: &str =
    "I couldn't verify your identity. Please try signing in again.";

/// Research-assistant extras describing the context used for the reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyContext {
    pub pdf_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_method: Option<String>,
    pub user_level: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub response: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_messages: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ReplyContext>,
}

impl SendMessageResponse {
    pub fn success(response: impl Into<String>, tier: Tier, remaining: u32) -> Self {
        Self {
            response: response.into(),
            success: Some(true),
            tier: Some(tier.as_str().to_string()),
            remaining_messages: Some(remaining),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.success == Some(true) && self.error.is_none()
    }
}
