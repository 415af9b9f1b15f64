//! Usage ledger records.
//!
//! One record per user per assistant per calendar day. `messages_sent` only
//! grows within a day and resets implicitly because the date is part of the
//! key.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::assistant::AssistantId;
use crate::user::UserId;

/// Composite key of a usage record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageKey {
    pub user_id: UserId,
    pub assistant: AssistantId,
    pub date: NaiveDate,
}

impl UsageKey {
    pub fn new(user_id: UserId, assistant: AssistantId, date: NaiveDate) -> Self {
        Self {
            user_id,
            assistant,
            date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub key: UsageKey,
    pub messages_sent: u32,
    pub tokens_used: u64,
    /// Estimated spend in USD.
    pub cost_estimate: f64,
    pub last_message_at: DateTime<Utc>,
}

/// What one successful exchange adds to the day's record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageIncrement {
    pub tokens: u64,
    pub cost: f64,
}

impl UsageRecord {
    /// First record of the day.
    pub fn first(key: UsageKey, inc: UsageIncrement, at: DateTime<Utc>) -> Self {
        Self {
            key,
            messages_sent: 1,
            tokens_used: inc.tokens,
            cost_estimate: inc.cost,
            last_message_at: at,
        }
    }

    /// Fold one more exchange into this record.
    pub fn apply(&mut self, inc: UsageIncrement, at: DateTime<Utc>) {
        self.messages_sent = self.messages_sent.saturating_add(1);
        self.tokens_used = self.tokens_used.saturating_add(inc.tokens);
        self.cost_estimate += inc.cost;
        self.last_message_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_accumulates() {
        let key = UsageKey::new(
            UserId::from("u1"),
            AssistantId::Nora,
            NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
        );
        let t0 = Utc::now();
        let mut rec = UsageRecord::first(key, UsageIncrement { tokens: 100, cost: 0.01 }, t0);
        let t1 = t0 + chrono::Duration::seconds(5);
        rec.apply(UsageIncrement { tokens: 50, cost: 0.005 }, t1);

        assert_eq!(rec.messages_sent, 2);
        assert_eq!(rec.tokens_used, 150);
        assert!((rec.cost_estimate - 0.015).abs() < 1e-12);
        assert_eq!(rec.last_message_at, t1);
    }
}
