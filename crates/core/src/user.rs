//! User records and subscription tiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Internal user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subscription level, gating assistant access and quota.
///
/// `Unknown` covers any stored value this service does not recognise. Policy
/// tables treat it exactly like `Free`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Trial,
    Premium,
    Pro,
    Unknown,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Trial => "trial",
            Self::Premium => "premium",
            Self::Pro => "pro",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a stored tier string. Empty means `Free`; anything unrecognised
    /// is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "free" => Self::Free,
            "trial" => Self::Trial,
            "premium" => Self::Premium,
            "pro" => Self::Pro,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provisioned account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: UserId,

    /// Subject identifier issued by the external identity provider.
    pub external_subject: String,

    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,

    pub tier: Tier,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_ends_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// First whitespace-separated token of the full name, if any.
    pub fn given_name(&self) -> Option<&str> {
        self.full_name
            .as_deref()
            .and_then(|n| n.split_whitespace().next())
    }

    /// The tier used for entitlement decisions at `now`.
    ///
    /// An expired trial is treated as `Free`. Nothing is written back.
    pub fn effective_tier(&self, now: DateTime<Utc>) -> Tier {
        match (self.tier, self.trial_ends_at) {
            (Tier::Trial, Some(ends)) if ends < now => Tier::Free,
            (tier, _) => tier,
        }
    }
}

/// Profile fields delivered by the identity-provider webhook.
///
/// On `user.updated` only the fields that are `Some` are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalProfile {
    pub subject: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(tier: Tier, full_name: Option<&str>) -> User {
        User {
            id: UserId::new(),
            external_subject: "user_123".into(),
            email: "sam@example.edu".into(),
            username: None,
            full_name: full_name.map(String::from),
            first_name: None,
            last_name: None,
            avatar_url: None,
            university: None,
            major: None,
            tier,
            trial_ends_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn tier_parse_defaults() {
        assert_eq!(Tier::parse(""), Tier::Free);
        assert_eq!(Tier::parse("PRO"), Tier::Pro);
        assert_eq!(Tier::parse("enterprise"), Tier::Unknown);
    }

    #[test]
    fn given_name_takes_first_token() {
        assert_eq!(user(Tier::Pro, Some("Ada  Lovelace")).given_name(), Some("Ada"));
        assert_eq!(user(Tier::Pro, Some("   ")).given_name(), None);
        assert_eq!(user(Tier::Pro, None).given_name(), None);
    }

    #[test]
    fn expired_trial_is_free() {
        let now = Utc::now();
        let mut u = user(Tier::Trial, None);
        u.trial_ends_at = Some(now - Duration::days(1));
        assert_eq!(u.effective_tier(now), Tier::Free);

        u.trial_ends_at = Some(now + Duration::days(1));
        assert_eq!(u.effective_tier(now), Tier::Trial);
    }

    #[test]
    fn non_trial_ignores_trial_end() {
        let now = Utc::now();
        let mut u = user(Tier::Pro, None);
        u.trial_ends_at = Some(now - Duration::days(30));
        assert_eq!(u.effective_tier(now), Tier::Pro);
    }
}
