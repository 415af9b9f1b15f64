//! Decoding of the Responses API output shape.
//!
//! A response carries either a top-level `output_text` convenience field or
//! an ordered `output` array of typed items (`message`, `web_search_call`,
//! `file_search_call`, ...). Only `message` items with `output_text` parts
//! contribute text.

use serde::Deserialize;

/// Returned when a response contains no extractable text.
pub const CLARIFICATION_TEXT: &str = "I'm here to help! Could you rephrase your question?";

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsesBody {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub output_text: Option<String>,

    /// Kept as raw values so one malformed item cannot fail the whole decode.
    #[serde(default)]
    pub output: Vec<serde_json::Value>,

    #[serde(default)]
    pub usage: Option<ResponsesUsage>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ResponsesUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputItem {
    Message {
        #[serde(default)]
        content: Vec<serde_json::Value>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    OutputText {
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Where the reply text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedText {
    /// The top-level `output_text` field.
    Convenience(String),
    /// Text parts of the first message item that has any, joined by a blank line.
    Segments(String),
    /// Nothing usable in the response.
    Nothing,
}

impl ExtractedText {
    pub fn into_text(self) -> String {
        match self {
            Self::Convenience(text) | Self::Segments(text) => text,
            Self::Nothing => CLARIFICATION_TEXT.to_string(),
        }
    }
}

fn message_segments(item: &serde_json::Value) -> Option<String> {
    let OutputItem::Message { content } = serde_json::from_value(item.clone()).ok()? else {
        return None;
    };
    let parts: Vec<String> = content
        .into_iter()
        .filter_map(|part| match serde_json::from_value(part).ok()? {
            ContentPart::OutputText { text } if !text.is_empty() => Some(text),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n\n"))
}

pub fn extract_text(body: &ResponsesBody) -> ExtractedText {
    if let Some(text) = body.output_text.as_deref().filter(|t| !t.is_empty()) {
        return ExtractedText::Convenience(text.to_string());
    }
    body.output
        .iter()
        .find_map(message_segments)
        .map(ExtractedText::Segments)
        .unwrap_or(ExtractedText::Nothing)
}
