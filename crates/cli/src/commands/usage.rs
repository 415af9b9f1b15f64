//! CLI commands for the usage ledger and cost estimates.

use std::path::Path;

use chrono::NaiveDate;
use hikewise_config::AppConfig;
use hikewise_core::{AssistantId, UsageStore, UserStore};
use hikewise_store::SqliteStore;
use hikewise_telemetry::{PricingTable, Rates};

use super::load_config;

/// Built-in rates with the config's overrides applied.
pub(crate) fn pricing(config: &AppConfig) -> PricingTable {
    let table = PricingTable::with_defaults();
    let unknown = table.apply_overrides(
        config
            .pricing
            .iter()
            .map(|(name, p)| (name.as_str(), Rates::new(p.input_per_k, p.output_per_k))),
    );
    for name in unknown {
        tracing::warn!(assistant = %name, "Ignoring pricing override for unknown assistant");
    }
    table
}

/// Show a student's ledger records, newest day first.
pub async fn usage(
    config_path: Option<&Path>,
    subject: &str,
    date: Option<NaiveDate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let store = SqliteStore::new(&config.database.url).await?;

    let user = store
        .user_by_subject(subject)
        .await?
        .ok_or_else(|| format!("No user with subject '{subject}'"))?;

    let records: Vec<_> = store
        .usage_history(&user.id)
        .await?
        .into_iter()
        .filter(|r| date.is_none_or(|d| r.key.date == d))
        .collect();

    println!("📊 Usage for {} ({}, tier {})", subject, user.email, user.tier);
    println!("─────────────────────────────────────────────────────");
    if records.is_empty() {
        println!("  No usage recorded.");
        return Ok(());
    }

    println!(
        "{:<12} {:<9} {:>8} {:>10} {:>10}",
        "Date", "Assistant", "Messages", "Tokens", "Cost"
    );
    for r in &records {
        println!(
            "{:<12} {:<9} {:>8} {:>10} ${:>9.5}",
            r.key.date, r.key.assistant, r.messages_sent, r.tokens_used, r.cost_estimate
        );
    }

    let total: f64 = records.iter().map(|r| r.cost_estimate).sum();
    println!();
    println!("  Total estimated cost: ${total:.5}");

    Ok(())
}

/// Price one exchange at the configured rates.
pub fn estimate(
    config_path: Option<&Path>,
    assistant: &str,
    input_tokens: u64,
    output_tokens: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let assistant = AssistantId::parse(assistant)
        .ok_or_else(|| format!("Unknown assistant '{assistant}' (expected nora or patrick)"))?;
    let config = load_config(config_path)?;
    let table = pricing(&config);

    let rates = table.get(assistant).ok_or("No rates for assistant")?;
    let cost = table.compute_cost(assistant, input_tokens, output_tokens);

    println!("💰 {} (per 1K tokens)", assistant.display_name());
    println!("─────────────────────────────────────");
    println!("  Input:  ${:.5} x {input_tokens}", rates.input_per_k);
    println!("  Output: ${:.5} x {output_tokens}", rates.output_per_k);
    println!("  Cost:   ${cost:.6}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hikewise_config::PricingOverrideConfig;

    #[test]
    fn overrides_replace_defaults() {
        let mut config = AppConfig::default();
        config.pricing.insert(
            "patrick".into(),
            PricingOverrideConfig {
                input_per_k: 0.001,
                output_per_k: 0.002,
            },
        );
        config.pricing.insert(
            "clippy".into(),
            PricingOverrideConfig {
                input_per_k: 9.0,
                output_per_k: 9.0,
            },
        );

        let table = pricing(&config);
        let cost = table.compute_cost(AssistantId::Patrick, 1000, 1000);
        assert!((cost - 0.003).abs() < 1e-12);
        let nora = table.compute_cost(AssistantId::Nora, 1000, 1000);
        assert!((nora - 0.0125).abs() < 1e-12);
    }
}
