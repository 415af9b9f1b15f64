//! Error types for the HikeWise domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum. None of these ever cross the
//! `send_message` boundary: the pipeline turns them into payload fields or
//! into the fallback responder.

use thiserror::Error;

/// The top-level error type for HikeWise operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Persistence ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- External completion / transcription endpoints ---
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    // --- Configuration ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Failures talking to the external completion or speech-to-text endpoint.
///
/// Every variant resolves to the fallback responder in the chat pipeline.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("Upstream not configured: {0}")]
    NotConfigured(String),

    #[error("Upstream returned status {status_code}: {message}")]
    Status { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse upstream response: {0}")]
    Parse(String),

    #[error("Upstream call timed out after {0}s")]
    Timeout(u64),

    #[error("Upstream returned an empty completion")]
    EmptyCompletion,
}

impl UpstreamError {
    /// Short stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConfigured(_) => "not_configured",
            Self::Status { .. } => "status",
            Self::Network(_) => "network",
            Self::Parse(_) => "parse",
            Self::Timeout(_) => "timeout",
            Self::EmptyCompletion => "empty",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_displays_code() {
        let err = Error::Upstream(UpstreamError::Status {
            status_code: 400,
            message: "previous_response_not_found".into(),
        });
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("previous_response_not_found"));
    }

    #[test]
    fn upstream_kind_labels() {
        assert_eq!(UpstreamError::Timeout(30).kind(), "timeout");
        assert_eq!(UpstreamError::EmptyCompletion.kind(), "empty");
        assert_eq!(UpstreamError::NotConfigured("nora".into()).kind(), "not_configured");
    }

    #[test]
    fn store_error_converts() {
        let err: Error = StoreError::NotFound("user".into()).into();
        assert!(err.to_string().contains("user"));
    }
}
