//! Security module for HikeWise: input hygiene and inbound webhook authentication.
//!
//! Provides:
//! - **Sanitizer**: Script/markup stripping and plan length limits for chat input
//! - **Signatures**: HMAC-SHA256 verification of identity-provider webhooks

pub mod sanitize;
pub mod signature;

pub use sanitize::{char_len, sanitize, sanitize_with_limit, TooLong};
pub use signature::{SignatureError, SignedHeaders, WebhookVerifier};
