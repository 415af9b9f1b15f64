//! Upstream clients for HikeWise.
//!
//! All completion clients implement `hikewise_core::CompletionProvider`:
//! - [`ResponsesProvider`] speaks the stateful Responses endpoint and
//!   handles continuity references (Nora).
//! - [`ChatCompletionsProvider`] speaks the stateless chat endpoint and
//!   replays history (Patrick).
//!
//! [`WhisperClient`] implements `hikewise_core::SpeechToText`.

pub mod chat;
pub mod extract;
mod http;
pub mod responses;
pub mod transcribe;

pub use chat::ChatCompletionsProvider;
pub use extract::{CLARIFICATION_TEXT, ExtractedText, extract_text};
pub use http::DEFAULT_BASE_URL;
pub use responses::ResponsesProvider;
pub use transcribe::WhisperClient;
