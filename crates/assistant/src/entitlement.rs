//! Tier gating and daily quota.
//!
//! The check only reads today's usage record. Nothing is reserved here; the
//! ledger increments after a successful exchange, so concurrent requests
//! from one user can both pass before either is counted.

use chrono::{DateTime, Utc};
use hikewise_core::{Tier, User};
use tracing::error;

use crate::ledger::UsageLedger;
use crate::persona::Persona;

/// One row of an assistant's policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPolicy {
    pub enabled: bool,
    pub messages_per_day: u32,
    /// Maximum sanitized message length, in characters.
    pub max_len: usize,
}

impl TierPolicy {
    pub const fn enabled(messages_per_day: u32, max_len: usize) -> Self {
        Self {
            enabled: true,
            messages_per_day,
            max_len,
        }
    }

    pub const fn disabled(max_len: usize) -> Self {
        Self {
            enabled: false,
            messages_per_day: 0,
            max_len,
        }
    }
}

/// Why a request was refused. Each maps to distinct upsell copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    TierIneligible,
    QuotaExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entitlement {
    pub allowed: bool,
    pub tier: Tier,
    /// Empty when allowed.
    pub reason: String,
    pub remaining: u32,
    pub max_len: usize,
    pub denial: Option<Denial>,
}

pub struct RateLimiter<'a> {
    ledger: &'a UsageLedger,
}

impl<'a> RateLimiter<'a> {
    pub fn new(ledger: &'a UsageLedger) -> Self {
        Self { ledger }
    }

    pub async fn check(&self, user: &User, persona: &dyn Persona, now: DateTime<Utc>) -> Entitlement {
        let tier = user.effective_tier(now);
        let policy = persona.policy(tier);

        if !policy.enabled {
            return Self::deny(persona, tier, &policy, Denial::TierIneligible);
        }

        let sent = match self.ledger.today(&user.id, persona.id(), now).await {
            Ok(record) => record.map(|r| r.messages_sent).unwrap_or(0),
            Err(e) => {
                error!(user = %user.id, assistant = %persona.id(), "Usage read failed, allowing: {e}");
                0
            }
        };

        if sent >= policy.messages_per_day {
            return Self::deny(persona, tier, &policy, Denial::QuotaExhausted);
        }

        Entitlement {
            allowed: true,
            tier,
            reason: String::new(),
            remaining: policy.messages_per_day - sent,
            max_len: policy.max_len,
            denial: None,
        }
    }

    fn deny(persona: &dyn Persona, tier: Tier, policy: &TierPolicy, denial: Denial) -> Entitlement {
        Entitlement {
            allowed: false,
            tier,
            reason: persona.denial_reason(tier, denial, policy),
            remaining: 0,
            max_len: policy.max_len,
            denial: Some(denial),
        }
    }
}
