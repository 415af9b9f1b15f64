//! Personalisation inputs: onboarding answers, leaderboard stats, focus
//! sessions, and the per-request snapshot that bundles them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user::{User, UserId};

/// Answers collected during onboarding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnboardingPreferences {
    pub user_id: UserId,

    #[serde(default)]
    pub is_onboarding_complete: bool,

    /// Preferred study method, e.g. "Pomodoro".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_method: Option<String>,

    /// Weekly focus goal in hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_focus_goal: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
}

impl OnboardingPreferences {
    /// Fresh record provisioned for a new account.
    pub fn blank(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }
}

/// Aggregate gamification stats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardStats {
    pub user_id: UserId,
    pub level: u32,
    /// Lifetime focus time in seconds.
    pub total_focus_time: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub sessions_completed: u32,
}

impl LeaderboardStats {
    /// Starting stats for a new account (level 1, everything else zero).
    pub fn starting(user_id: UserId) -> Self {
        Self {
            user_id,
            level: 1,
            ..Self::default()
        }
    }

    pub fn total_focus_hours(&self) -> u64 {
        self.total_focus_time / 3600
    }
}

/// One timed focus session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusSession {
    pub id: String,
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Everything the prompt builders know about a student for one request.
///
/// Assembled fresh per request and never persisted. Every field may be
/// missing; consumers default field by field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSnapshot {
    pub user: Option<User>,
    pub onboarding: Option<OnboardingPreferences>,
    pub leaderboard: Option<LeaderboardStats>,
    /// Most recent first.
    pub recent_sessions: Vec<FocusSession>,
}

impl ContextSnapshot {
    pub fn given_name(&self) -> Option<&str> {
        self.user.as_ref().and_then(User::given_name)
    }

    pub fn focus_method(&self) -> Option<&str> {
        self.onboarding
            .as_ref()
            .and_then(|o| o.focus_method.as_deref())
            .filter(|m| !m.is_empty())
    }

    pub fn weekly_focus_goal(&self) -> Option<u32> {
        self.onboarding
            .as_ref()
            .and_then(|o| o.weekly_focus_goal)
            .filter(|g| *g > 0)
    }

    /// Profile university, falling back to the onboarding answer.
    pub fn university(&self) -> Option<&str> {
        self.user
            .as_ref()
            .and_then(|u| u.university.as_deref())
            .or_else(|| self.onboarding.as_ref().and_then(|o| o.university.as_deref()))
            .filter(|s| !s.is_empty())
    }

    /// Profile major, falling back to the onboarding answer.
    pub fn major(&self) -> Option<&str> {
        self.user
            .as_ref()
            .and_then(|u| u.major.as_deref())
            .or_else(|| self.onboarding.as_ref().and_then(|o| o.major.as_deref()))
            .filter(|s| !s.is_empty())
    }

    /// Leaderboard level, with a missing record or a zero level read as 1.
    pub fn level(&self) -> u32 {
        self.leaderboard
            .as_ref()
            .map(|l| l.level)
            .filter(|l| *l > 0)
            .unwrap_or(1)
    }

    /// Total minutes across the recent sessions, rounded.
    pub fn recent_focus_minutes(&self) -> u64 {
        let seconds: u64 = self
            .recent_sessions
            .iter()
            .filter_map(|s| s.duration_seconds)
            .sum();
        (seconds as f64 / 60.0).round() as u64
    }
}
