//! Store traits: the persistence seams the pipeline depends on.
//!
//! Split by concern so tests can fake one side at a time. Both the SQLite
//! backend and the in-memory backend implement all of them, and the
//! [`Store`] umbrella trait lets callers hold a single `Arc<dyn Store>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::assistant::AssistantId;
use crate::error::StoreError;
use crate::message::ChatMessage;
use crate::profile::{FocusSession, LeaderboardStats, OnboardingPreferences};
use crate::usage::{UsageIncrement, UsageKey, UsageRecord};
use crate::user::{ExternalProfile, Tier, User, UserId};

type StoreResult<T> = std::result::Result<T, StoreError>;

/// Account records, keyed by the identity provider's subject.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user_by_subject(&self, subject: &str) -> StoreResult<Option<User>>;

    async fn user_by_id(&self, id: &UserId) -> StoreResult<Option<User>>;

    /// Provision an account on the `trial` tier together with blank
    /// onboarding preferences and starting leaderboard stats.
    ///
    /// Idempotent: when the subject already exists the existing record is
    /// returned unchanged.
    async fn create_user(&self, profile: &ExternalProfile) -> StoreResult<User>;

    /// Apply the `Some` fields of `profile`. Returns `None` if the subject is
    /// unknown.
    async fn update_user(&self, profile: &ExternalProfile) -> StoreResult<Option<User>>;

    /// Delete the account and everything keyed to it. Returns whether a
    /// record existed.
    async fn delete_user(&self, subject: &str) -> StoreResult<bool>;

    /// Change the subscription tier. Returns whether the subject exists.
    async fn set_tier(&self, subject: &str, tier: Tier) -> StoreResult<bool>;
}

/// Personalisation data read by the context assembler.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn onboarding(&self, user: &UserId) -> StoreResult<Option<OnboardingPreferences>>;

    async fn leaderboard(&self, user: &UserId) -> StoreResult<Option<LeaderboardStats>>;

    /// Most recent sessions first, at most `limit`.
    async fn recent_focus_sessions(
        &self,
        user: &UserId,
        limit: usize,
    ) -> StoreResult<Vec<FocusSession>>;

    async fn save_onboarding(&self, prefs: &OnboardingPreferences) -> StoreResult<()>;

    async fn save_leaderboard(&self, stats: &LeaderboardStats) -> StoreResult<()>;

    async fn add_focus_session(&self, session: &FocusSession) -> StoreResult<()>;
}

/// The daily usage ledger.
#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn usage(&self, key: &UsageKey) -> StoreResult<Option<UsageRecord>>;

    /// Upsert: create the day's record with one message, or add one message
    /// plus the token and cost increments to the existing record.
    async fn record_usage(
        &self,
        key: &UsageKey,
        inc: UsageIncrement,
        at: DateTime<Utc>,
    ) -> StoreResult<UsageRecord>;

    /// All records for a user, newest day first.
    async fn usage_history(&self, user: &UserId) -> StoreResult<Vec<UsageRecord>>;
}

/// The append-only chat transcript.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn append_message(&self, message: &ChatMessage) -> StoreResult<()>;

    /// The last `limit` messages in chronological order.
    async fn recent_messages(
        &self,
        user: &UserId,
        assistant: AssistantId,
        limit: usize,
    ) -> StoreResult<Vec<ChatMessage>>;
}

/// The upstream conversation reference per user per assistant.
#[async_trait]
pub trait ContinuityStore: Send + Sync {
    async fn last_response_id(
        &self,
        user: &UserId,
        assistant: AssistantId,
    ) -> StoreResult<Option<String>>;

    async fn save_response_id(
        &self,
        user: &UserId,
        assistant: AssistantId,
        response_id: &str,
    ) -> StoreResult<()>;
}

/// Everything the pipeline needs from persistence.
pub trait Store:
    UserStore + ProfileStore + UsageStore + TranscriptStore + ContinuityStore
{
}

impl<T> Store for T where
    T: UserStore + ProfileStore + UsageStore + TranscriptStore + ContinuityStore
{
}
