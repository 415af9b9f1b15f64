//! Inbound chat request shape.

use serde::{Deserialize, Serialize};

/// Research depth requested by the student.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingMode {
    #[default]
    Fast,
    Deep,
}

/// A document the student has open alongside the chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContext {
    pub title: String,

    #[serde(default, alias = "file_path", skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,

    #[serde(default, alias = "thinkingMode")]
    pub thinking_mode: ThinkingMode,

    #[serde(default, alias = "documentContext", alias = "pdfContext")]
    pub document: Option<DocumentContext>,

    #[serde(default, alias = "vectorStoreId")]
    pub vector_store_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_thinking_mode(mut self, mode: ThinkingMode) -> Self {
        self.thinking_mode = mode;
        self
    }

    pub fn with_document(mut self, title: impl Into<String>) -> Self {
        self.document = Some(DocumentContext {
            title: title.into(),
            path: None,
        });
        self
    }

    pub fn with_vector_store(mut self, id: impl Into<String>) -> Self {
        self.vector_store_id = Some(id.into());
        self
    }

    /// The vector store id, ignoring blank values.
    pub fn vector_store(&self) -> Option<&str> {
        self.vector_store_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}
