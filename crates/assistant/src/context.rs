//! Per-request student context.
//!
//! The four reads are independent and issued concurrently. Every read is
//! best-effort: a failure is logged and the field is left empty, and the
//! prompt builders default field by field.

use std::sync::Arc;

use hikewise_core::{ContextSnapshot, ProfileStore, Store, User, UserStore};
use tracing::error;

pub struct ContextAssembler {
    store: Arc<dyn Store>,
}

impl ContextAssembler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Read the profile, onboarding answers, leaderboard stats and the
    /// `session_limit` most recent focus sessions for `user`.
    pub async fn assemble(&self, user: &User, session_limit: usize) -> ContextSnapshot {
        let id = &user.id;
        let (profile, onboarding, leaderboard, sessions) = tokio::join!(
            self.store.user_by_id(id),
            self.store.onboarding(id),
            self.store.leaderboard(id),
            self.store.recent_focus_sessions(id, session_limit),
        );

        let profile = match profile {
            Ok(found) => found,
            Err(e) => {
                error!(user = %id, "Profile read failed: {e}");
                None
            }
        };

        ContextSnapshot {
            // The resolved identity is a valid profile if the fresh read came back empty.
            user: Some(profile.unwrap_or_else(|| user.clone())),
            onboarding: onboarding.unwrap_or_else(|e| {
                error!(user = %id, "Onboarding read failed: {e}");
                None
            }),
            leaderboard: leaderboard.unwrap_or_else(|e| {
                error!(user = %id, "Leaderboard read failed: {e}");
                None
            }),
            recent_sessions: sessions.unwrap_or_else(|e| {
                error!(user = %id, "Focus session read failed: {e}");
                Vec::new()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use hikewise_core::{ExternalProfile, FocusSession, LeaderboardStats, OnboardingPreferences};
    use hikewise_store::InMemoryStore;

    async fn seeded() -> (Arc<InMemoryStore>, User) {
        let store = Arc::new(InMemoryStore::new());
        let user = store
            .create_user(&ExternalProfile {
                subject: "sub_ctx".into(),
                email: Some("ctx@example.edu".into()),
                full_name: Some("Priya Natarajan".into()),
                ..ExternalProfile::default()
            })
            .await
            .unwrap();

        let mut prefs = OnboardingPreferences::blank(user.id.clone());
        prefs.focus_method = Some("Pomodoro".into());
        prefs.weekly_focus_goal = Some(12);
        store.save_onboarding(&prefs).await.unwrap();

        let mut stats = LeaderboardStats::starting(user.id.clone());
        stats.level = 4;
        store.save_leaderboard(&stats).await.unwrap();

        let start = Utc::now() - Duration::days(3);
        for i in 0..7 {
            store
                .add_focus_session(&FocusSession {
                    id: format!("fs_{i}"),
                    user_id: user.id.clone(),
                    started_at: start + Duration::hours(i),
                    ended_at: None,
                    duration_seconds: Some(1500),
                    status: Some("completed".into()),
                })
                .await
                .unwrap();
        }
        (store, user)
    }

    #[tokio::test]
    async fn assembles_all_sections() {
        let (store, user) = seeded().await;
        let snapshot = ContextAssembler::new(store).assemble(&user, 5).await;

        assert_eq!(snapshot.given_name(), Some("Priya"));
        assert_eq!(snapshot.focus_method(), Some("Pomodoro"));
        assert_eq!(snapshot.weekly_focus_goal(), Some(12));
        assert_eq!(snapshot.level(), 4);
        assert_eq!(snapshot.recent_sessions.len(), 5);
        assert_eq!(snapshot.recent_sessions[0].id, "fs_6");
    }

    #[tokio::test]
    async fn repeated_assembly_is_stable() {
        let (store, user) = seeded().await;
        let assembler = ContextAssembler::new(store);
        let first = assembler.assemble(&user, 10).await;
        let second = assembler.assemble(&user, 10).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_records_leave_gaps() {
        let store = Arc::new(InMemoryStore::new());
        let user = store
            .create_user(&ExternalProfile {
                subject: "sub_bare".into(),
                email: Some("bare@example.edu".into()),
                ..ExternalProfile::default()
            })
            .await
            .unwrap();

        let snapshot = ContextAssembler::new(store).assemble(&user, 10).await;
        assert!(snapshot.given_name().is_none());
        assert!(snapshot.focus_method().is_none());
        assert!(snapshot.recent_sessions.is_empty());
        assert_eq!(snapshot.level(), 1);
    }
}
