//! # HikeWise Core
//!
//! Domain types, traits, and error definitions for the HikeWise assistant
//! service. This crate has **zero framework dependencies**: it defines the
//! domain model that the store, provider, and pipeline crates implement
//! against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping the SQLite store for the in-memory one in tests
//! - Scripted completion providers instead of a live HTTP endpoint
//! - A clean dependency graph (all crates depend inward on core)

pub mod assistant;
pub mod clock;
pub mod error;
pub mod identity;
pub mod message;
pub mod profile;
pub mod provider;
pub mod store;
pub mod usage;
pub mod user;

// Re-export key types at crate root for ergonomics
pub use assistant::AssistantId;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result, StoreError, UpstreamError};
pub use identity::{CallerCredential, IdentityResolver, StoreIdentityResolver};
pub use message::{ChatMessage, Role};
pub use profile::{ContextSnapshot, FocusSession, LeaderboardStats, OnboardingPreferences};
pub use provider::{
    AudioUpload, Capability, CompletionProvider, CompletionRequest, CompletionResponse,
    HistoryTurn, SpeechToText, Usage,
};
pub use store::{
    ContinuityStore, ProfileStore, Store, TranscriptStore, UsageStore, UserStore,
};
pub use usage::{UsageIncrement, UsageKey, UsageRecord};
pub use user::{ExternalProfile, Tier, User, UserId};
