//! Assistant personas.
//!
//! A persona bundles everything that differs between the assistants: the
//! tier policy table and denial copy, the system prompt template, the
//! canned fallback responder, and how the upstream request is shaped. The
//! orchestrator is generic over [`Persona`].

pub mod nora;
pub mod patrick;

use hikewise_core::{AssistantId, Capability, ContextSnapshot, Tier};
use hikewise_security::TooLong;

use crate::entitlement::{Denial, TierPolicy};
use crate::request::ChatRequest;
use crate::response::ReplyContext;

pub use nora::NoraPersona;
pub use patrick::PatrickPersona;

/// How conversation continuity reaches the upstream model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuity {
    /// Chain on the stored response id of the previous exchange.
    ResponseChain,
    /// Replay up to `window` recent transcript messages.
    Transcript { window: usize },
}

/// Upstream request parameters chosen for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionPlan {
    pub model: String,
    pub temperature: f32,
    pub capabilities: Vec<Capability>,
    pub max_output_tokens: Option<u32>,
    pub continuity: Continuity,
}

/// A reply given without calling upstream or consuming quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preempt {
    pub reply: &'static str,
    pub upgrade_prompt: &'static str,
}

pub trait Persona: Send + Sync {
    fn id(&self) -> AssistantId;

    /// Policy row for `tier`. Tiers without a row get the `free` row.
    fn policy(&self, tier: Tier) -> TierPolicy;

    /// Upsell copy for a denied request.
    fn denial_reason(&self, tier: Tier, denial: Denial, policy: &TierPolicy) -> String;

    fn too_long_reply(&self, too_long: &TooLong) -> String;

    /// Whether a too-long reply should carry the upgrade flag.
    fn too_long_upgrade(&self, tier: Tier) -> bool;

    /// How many recent focus sessions the context assembler reads.
    fn session_window(&self) -> usize;

    /// A fixed reply for requests this persona declines outright.
    fn preempt(&self, _request: &ChatRequest) -> Option<Preempt> {
        None
    }

    fn instructions(&self, ctx: &ContextSnapshot, request: &ChatRequest) -> String;

    /// Deterministic reply used when upstream is unconfigured or fails.
    fn fallback(&self, input: &str, ctx: &ContextSnapshot, request: &ChatRequest) -> String;

    fn plan(&self, request: &ChatRequest) -> CompletionPlan;

    fn reply_context(&self, _ctx: &ContextSnapshot, _request: &ChatRequest) -> Option<ReplyContext> {
        None
    }
}

/// First name for greetings, or "there".
pub(crate) fn greeting_name(ctx: &ContextSnapshot) -> &str {
    ctx.given_name().unwrap_or("there")
}

pub(crate) const DEFAULT_FOCUS_METHOD: &str = "Balanced Focus";
pub(crate) const DEFAULT_WEEKLY_GOAL: u32 = 5;

/// Case-insensitive substring match against any keyword.
pub(crate) fn mentions(lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| lower.contains(k))
}
