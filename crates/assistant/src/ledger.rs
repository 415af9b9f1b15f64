//! Usage ledger: per user, per assistant, per calendar day.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use hikewise_core::{
    AssistantId, Store, StoreError, Usage, UsageIncrement, UsageKey, UsageRecord, UsageStore,
    UserId,
};
use hikewise_telemetry::PricingTable;
use tracing::debug;

#[derive(Clone)]
pub struct UsageLedger {
    store: Arc<dyn Store>,
    pricing: Arc<PricingTable>,
    offset: FixedOffset,
}

impl UsageLedger {
    pub fn new(store: Arc<dyn Store>, pricing: Arc<PricingTable>) -> Self {
        Self {
            store,
            pricing,
            offset: utc(),
        }
    }

    /// Calendar days roll over at midnight in a zone `minutes` east of UTC.
    /// Out-of-range offsets fall back to UTC.
    pub fn with_utc_offset(mut self, minutes: i32) -> Self {
        self.offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(utc);
        self
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// The date key that `at` falls on.
    pub fn day(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    pub fn key(&self, user: &UserId, assistant: AssistantId, at: DateTime<Utc>) -> UsageKey {
        UsageKey::new(user.clone(), assistant, self.day(at))
    }

    pub async fn today(
        &self,
        user: &UserId,
        assistant: AssistantId,
        now: DateTime<Utc>,
    ) -> Result<Option<UsageRecord>, StoreError> {
        self.store.usage(&self.key(user, assistant, now)).await
    }

    /// Tokens and estimated cost for one exchange. Missing usage counts as zero.
    pub fn increment(&self, assistant: AssistantId, usage: Option<&Usage>) -> UsageIncrement {
        let Some(usage) = usage else {
            return UsageIncrement::default();
        };
        let tokens = if usage.total_tokens > 0 {
            usage.total_tokens
        } else {
            usage.input_tokens + usage.output_tokens
        };
        UsageIncrement {
            tokens,
            cost: self.pricing.cost_for_usage(assistant, usage),
        }
    }

    /// Count one successful exchange against today's record.
    pub async fn record(
        &self,
        user: &UserId,
        assistant: AssistantId,
        usage: Option<&Usage>,
        at: DateTime<Utc>,
    ) -> Result<UsageRecord, StoreError> {
        let inc = self.increment(assistant, usage);
        let record = self
            .store
            .record_usage(&self.key(user, assistant, at), inc, at)
            .await?;
        debug!(
            user = %user,
            assistant = %assistant,
            messages = record.messages_sent,
            tokens = record.tokens_used,
            "Usage recorded"
        );
        Ok(record)
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hikewise_store::InMemoryStore;

    fn ledger() -> (Arc<InMemoryStore>, UsageLedger) {
        let store = Arc::new(InMemoryStore::new());
        let ledger = UsageLedger::new(store.clone(), Arc::new(PricingTable::with_defaults()));
        (store, ledger)
    }

    #[tokio::test]
    async fn accumulates_into_one_daily_record() {
        let (_, ledger) = ledger();
        let user = UserId::from("u1");
        let at = Utc.with_ymd_and_hms(2026, 5, 2, 9, 0, 0).unwrap();
        let usage = Usage {
            input_tokens: 1000,
            output_tokens: 500,
            total_tokens: 1500,
        };

        ledger.record(&user, AssistantId::Nora, Some(&usage), at).await.unwrap();
        let rec = ledger.record(&user, AssistantId::Nora, None, at).await.unwrap();

        assert_eq!(rec.messages_sent, 2);
        assert_eq!(rec.tokens_used, 1500);
        assert!((rec.cost_estimate - 0.0075).abs() < 1e-9);
        assert_eq!(rec.last_message_at, at);
    }

    #[test]
    fn total_falls_back_to_sum() {
        let (_, ledger) = ledger();
        let inc = ledger.increment(
            AssistantId::Patrick,
            Some(&Usage {
                input_tokens: 300,
                output_tokens: 100,
                total_tokens: 0,
            }),
        );
        assert_eq!(inc.tokens, 400);
        assert!((inc.cost - (0.3 * 0.00015 + 0.1 * 0.0006)).abs() < 1e-12);
    }

    #[test]
    fn offset_moves_the_day_boundary() {
        let (_, ledger) = ledger();
        let late_utc = Utc.with_ymd_and_hms(2026, 5, 2, 23, 30, 0).unwrap();
        assert_eq!(ledger.day(late_utc), NaiveDate::from_ymd_opt(2026, 5, 2).unwrap());

        let ahead = ledger.clone().with_utc_offset(60);
        assert_eq!(ahead.day(late_utc), NaiveDate::from_ymd_opt(2026, 5, 3).unwrap());

        let behind = ledger.with_utc_offset(-5 * 60);
        let early_utc = Utc.with_ymd_and_hms(2026, 5, 2, 3, 0, 0).unwrap();
        assert_eq!(behind.day(early_utc), NaiveDate::from_ymd_opt(2026, 5, 1).unwrap());
    }

    #[tokio::test]
    async fn write_failure_is_reported() {
        let (store, ledger) = ledger();
        store.set_fail_writes(true);
        let err = ledger
            .record(&UserId::from("u1"), AssistantId::Nora, None, Utc::now())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unavailable"));
    }
}
