//! The HikeWise assistant pipeline.
//!
//! A student message flows through:
//!
//! 1. **Identity** resolution of the caller
//! 2. **Entitlement**: tier gate and daily quota per assistant
//! 3. **Sanitizing** and length limits
//! 4. **Context** assembly (profile, onboarding, stats, recent sessions)
//! 5. **Persona** prompt building and the upstream call, with a
//!    deterministic fallback when upstream is unavailable
//! 6. **Ledger** accounting and transcript persistence
//!
//! [`AssistantService::send_message`] runs the whole sequence and always
//! returns a [`SendMessageResponse`].

pub mod context;
pub mod entitlement;
pub mod ledger;
pub mod persona;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod transcription;

pub use context::ContextAssembler;
pub use entitlement::{Denial, Entitlement, RateLimiter, TierPolicy};
pub use ledger::UsageLedger;
pub use persona::{CompletionPlan, Continuity, NoraPersona, PatrickPersona, Persona, Preempt};
pub use pipeline::{AssistantService, ChatFailure, DEFAULT_UPSTREAM_TIMEOUT};
pub use request::{ChatRequest, DocumentContext, ThinkingMode};
pub use response::{
    ACCESS_DENIED_CODE, AUTH_FAILED_CODE, MESSAGE_TOO_LONG_CODE, ReplyContext,
    SendMessageResponse,
};
pub use transcription::{TranscribeRequest, TranscribeResponse, TranscriptionService};
