//! In-memory store: useful for tests and ephemeral deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hikewise_core::error::StoreError;
use hikewise_core::{
    AssistantId, ChatMessage, ContinuityStore, ExternalProfile, FocusSession, LeaderboardStats,
    OnboardingPreferences, ProfileStore, Tier, TranscriptStore, UsageIncrement, UsageKey,
    UsageRecord, UsageStore, User, UserId, UserStore,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

type StoreResult<T> = Result<T, StoreError>;

#[derive(Default)]
struct State {
    users: Vec<User>,
    onboarding: HashMap<UserId, OnboardingPreferences>,
    leaderboard: HashMap<UserId, LeaderboardStats>,
    sessions: Vec<FocusSession>,
    usage: HashMap<UsageKey, UsageRecord>,
    transcript: Vec<ChatMessage>,
    continuity: HashMap<(UserId, AssistantId), String>,
}

/// A store that keeps everything in process memory.
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every write fail with a storage error, simulating an
    /// unavailable backend. Reads keep working.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("store unavailable".into()));
        }
        Ok(())
    }

    /// Insert a fully-formed user record as-is (seeding helper).
    pub async fn insert_user(&self, user: User) -> StoreResult<()> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        state.users.retain(|u| u.external_subject != user.external_subject);
        state.users.push(user);
        Ok(())
    }

    /// Number of transcript entries across all users.
    pub async fn transcript_len(&self) -> usize {
        self.state.read().await.transcript.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn user_by_subject(&self, subject: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.external_subject == subject)
            .cloned())
    }

    async fn user_by_id(&self, id: &UserId) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| &u.id == id).cloned())
    }

    async fn create_user(&self, profile: &ExternalProfile) -> StoreResult<User> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .users
            .iter()
            .find(|u| u.external_subject == profile.subject)
        {
            return Ok(existing.clone());
        }
        let email = profile
            .email
            .clone()
            .ok_or_else(|| StoreError::InvalidRecord("email is required".into()))?;

        let user = User {
            id: UserId::new(),
            external_subject: profile.subject.clone(),
            email,
            username: profile.username.clone(),
            full_name: profile.full_name.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            university: None,
            major: None,
            tier: Tier::Trial,
            trial_ends_at: None,
            created_at: Utc::now(),
        };
        state
            .onboarding
            .entry(user.id.clone())
            .or_insert_with(|| OnboardingPreferences::blank(user.id.clone()));
        state
            .leaderboard
            .entry(user.id.clone())
            .or_insert_with(|| LeaderboardStats::starting(user.id.clone()));
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, profile: &ExternalProfile) -> StoreResult<Option<User>> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let Some(user) = state
            .users
            .iter_mut()
            .find(|u| u.external_subject == profile.subject)
        else {
            return Ok(None);
        };

        if let Some(email) = &profile.email {
            user.email = email.clone();
        }
        let patch = |field: &mut Option<String>, value: &Option<String>| {
            if value.is_some() {
                *field = value.clone();
            }
        };
        patch(&mut user.username, &profile.username);
        patch(&mut user.full_name, &profile.full_name);
        patch(&mut user.first_name, &profile.first_name);
        patch(&mut user.last_name, &profile.last_name);
        patch(&mut user.avatar_url, &profile.avatar_url);
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, subject: &str) -> StoreResult<bool> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let Some(pos) = state.users.iter().position(|u| u.external_subject == subject) else {
            return Ok(false);
        };
        let user = state.users.remove(pos);
        let id = &user.id;
        state.onboarding.remove(id);
        state.leaderboard.remove(id);
        state.sessions.retain(|s| &s.user_id != id);
        state.usage.retain(|k, _| &k.user_id != id);
        state.transcript.retain(|m| &m.user_id != id);
        state.continuity.retain(|(u, _), _| u != id);
        Ok(true)
    }

    async fn set_tier(&self, subject: &str, tier: Tier) -> StoreResult<bool> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        match state
            .users
            .iter_mut()
            .find(|u| u.external_subject == subject)
        {
            Some(user) => {
                user.tier = tier;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn onboarding(&self, user: &UserId) -> StoreResult<Option<OnboardingPreferences>> {
        Ok(self.state.read().await.onboarding.get(user).cloned())
    }

    async fn leaderboard(&self, user: &UserId) -> StoreResult<Option<LeaderboardStats>> {
        Ok(self.state.read().await.leaderboard.get(user).cloned())
    }

    async fn recent_focus_sessions(
        &self,
        user: &UserId,
        limit: usize,
    ) -> StoreResult<Vec<FocusSession>> {
        let state = self.state.read().await;
        let mut sessions: Vec<FocusSession> = state
            .sessions
            .iter()
            .filter(|s| &s.user_id == user)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    async fn save_onboarding(&self, prefs: &OnboardingPreferences) -> StoreResult<()> {
        self.check_writable()?;
        self.state
            .write()
            .await
            .onboarding
            .insert(prefs.user_id.clone(), prefs.clone());
        Ok(())
    }

    async fn save_leaderboard(&self, stats: &LeaderboardStats) -> StoreResult<()> {
        self.check_writable()?;
        self.state
            .write()
            .await
            .leaderboard
            .insert(stats.user_id.clone(), stats.clone());
        Ok(())
    }

    async fn add_focus_session(&self, session: &FocusSession) -> StoreResult<()> {
        self.check_writable()?;
        self.state.write().await.sessions.push(session.clone());
        Ok(())
    }
}

#[async_trait]
impl UsageStore for InMemoryStore {
    async fn usage(&self, key: &UsageKey) -> StoreResult<Option<UsageRecord>> {
        Ok(self.state.read().await.usage.get(key).cloned())
    }

    async fn record_usage(
        &self,
        key: &UsageKey,
        inc: UsageIncrement,
        at: DateTime<Utc>,
    ) -> StoreResult<UsageRecord> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let record = state
            .usage
            .entry(key.clone())
            .and_modify(|r| r.apply(inc, at))
            .or_insert_with(|| UsageRecord::first(key.clone(), inc, at));
        Ok(record.clone())
    }

    async fn usage_history(&self, user: &UserId) -> StoreResult<Vec<UsageRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<UsageRecord> = state
            .usage
            .values()
            .filter(|r| &r.key.user_id == user)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.key
                .date
                .cmp(&a.key.date)
                .then_with(|| a.key.assistant.as_str().cmp(b.key.assistant.as_str()))
        });
        Ok(records)
    }
}

#[async_trait]
impl TranscriptStore for InMemoryStore {
    async fn append_message(&self, message: &ChatMessage) -> StoreResult<()> {
        self.check_writable()?;
        self.state.write().await.transcript.push(message.clone());
        Ok(())
    }

    async fn recent_messages(
        &self,
        user: &UserId,
        assistant: AssistantId,
        limit: usize,
    ) -> StoreResult<Vec<ChatMessage>> {
        let state = self.state.read().await;
        let thread: Vec<&ChatMessage> = state
            .transcript
            .iter()
            .filter(|m| &m.user_id == user && m.assistant == assistant)
            .collect();
        let skip = thread.len().saturating_sub(limit);
        Ok(thread.into_iter().skip(skip).cloned().collect())
    }
}

#[async_trait]
impl ContinuityStore for InMemoryStore {
    async fn last_response_id(
        &self,
        user: &UserId,
        assistant: AssistantId,
    ) -> StoreResult<Option<String>> {
        Ok(self
            .state
            .read()
            .await
            .continuity
            .get(&(user.clone(), assistant))
            .cloned())
    }

    async fn save_response_id(
        &self,
        user: &UserId,
        assistant: AssistantId,
        response_id: &str,
    ) -> StoreResult<()> {
        self.check_writable()?;
        self.state
            .write()
            .await
            .continuity
            .insert((user.clone(), assistant), response_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn profile(subject: &str) -> ExternalProfile {
        ExternalProfile {
            subject: subject.into(),
            email: Some(format!("{subject}@example.edu")),
            ..ExternalProfile::default()
        }
    }

    #[tokio::test]
    async fn create_is_idempotent_and_provisions() {
        let store = InMemoryStore::new();
        let a = store.create_user(&profile("u1")).await.unwrap();
        let b = store.create_user(&profile("u1")).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.tier, Tier::Trial);
        assert_eq!(store.leaderboard(&a.id).await.unwrap().unwrap().level, 1);
        assert!(store.onboarding(&a.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn usage_increments() {
        let store = InMemoryStore::new();
        let user = store.create_user(&profile("u1")).await.unwrap();
        let key = UsageKey::new(
            user.id.clone(),
            AssistantId::Nora,
            NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
        );
        store
            .record_usage(&key, UsageIncrement { tokens: 10, cost: 0.1 }, Utc::now())
            .await
            .unwrap();
        let rec = store
            .record_usage(&key, UsageIncrement { tokens: 5, cost: 0.1 }, Utc::now())
            .await
            .unwrap();
        assert_eq!(rec.messages_sent, 2);
        assert_eq!(rec.tokens_used, 15);
    }

    #[tokio::test]
    async fn recent_messages_window() {
        let store = InMemoryStore::new();
        let uid = UserId::from("u1");
        for i in 0..5 {
            store
                .append_message(&ChatMessage::user(uid.clone(), AssistantId::Nora, format!("{i}")))
                .await
                .unwrap();
        }
        let recent = store
            .recent_messages(&uid, AssistantId::Nora, 2)
            .await
            .unwrap();
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["3", "4"]);
    }

    #[tokio::test]
    async fn failing_writes_keep_reads() {
        let store = InMemoryStore::new();
        let user = store.create_user(&profile("u1")).await.unwrap();
        store.set_fail_writes(true);
        assert!(
            store
                .append_message(&ChatMessage::user(user.id.clone(), AssistantId::Nora, "x"))
                .await
                .is_err()
        );
        assert!(store.user_by_subject("u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_cascades() {
        let store = InMemoryStore::new();
        let user = store.create_user(&profile("u1")).await.unwrap();
        store
            .save_response_id(&user.id, AssistantId::Nora, "r1")
            .await
            .unwrap();
        assert!(store.delete_user("u1").await.unwrap());
        assert!(store.onboarding(&user.id).await.unwrap().is_none());
        assert!(
            store
                .last_response_id(&user.id, AssistantId::Nora)
                .await
                .unwrap()
                .is_none()
        );
    }
}
