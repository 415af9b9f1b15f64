//! `hikewise set-tier`: Change a student's subscription tier.

use std::path::Path;

use hikewise_core::{Tier, UserStore};
use hikewise_store::SqliteStore;
use tracing::info;

use super::load_config;

/// Parse an operator-supplied tier. Unrecognised names are rejected rather
/// than stored.
pub(crate) fn parse_tier(name: &str) -> Result<Tier, String> {
    match Tier::parse(name) {
        Tier::Unknown => Err(format!(
            "Unknown tier '{name}' (expected free, trial, premium or pro)"
        )),
        _ if name.trim().is_empty() => Err("Tier must not be empty".into()),
        tier => Ok(tier),
    }
}

pub async fn run(
    config_path: Option<&Path>,
    subject: &str,
    tier: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let tier = parse_tier(tier)?;
    let config = load_config(config_path)?;
    let store = SqliteStore::new(&config.database.url).await?;

    if !store.set_tier(subject, tier).await? {
        return Err(format!("No user with subject '{subject}'").into());
    }

    info!(subject = %subject, tier = %tier, "Tier changed");
    println!("✅ {subject} is now on the {tier} tier");
    Ok(())
}
