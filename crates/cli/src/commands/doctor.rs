//! `hikewise doctor`: Check configuration, keys and database.

use std::path::Path;

use hikewise_config::AppConfig;
use hikewise_core::AssistantId;
use hikewise_security::WebhookVerifier;
use hikewise_store::SqliteStore;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 HikeWise Doctor — System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    let default_path = AppConfig::config_dir().join("config.toml");
    let path = config_path.unwrap_or(&default_path);
    if path.exists() {
        println!("  ✅ Config file found at {}", path.display());
    } else {
        println!("  ⚠️  No config file at {}, using defaults", path.display());
    }

    let config = match AppConfig::load_with(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running other checks.");
            return Ok(());
        }
    };

    for assistant in AssistantId::ALL {
        let key = match assistant {
            AssistantId::Nora => config.nora_api_key(),
            AssistantId::Patrick => config.patrick_api_key(),
        };
        if key.is_some_and(|k| !k.is_empty()) {
            println!("  ✅ {} API key configured", assistant.display_name());
        } else {
            println!(
                "  ⚠️  No {} API key, replies will come from the fallback responder",
                assistant.display_name()
            );
            issues += 1;
        }
    }

    if config.transcription_api_key().is_some_and(|k| !k.is_empty()) {
        println!("  ✅ Transcription key configured");
    } else {
        println!("  ⚠️  No transcription key, voice notes will be refused");
        issues += 1;
    }

    match config.webhook.secret.as_deref() {
        Some(secret) => match WebhookVerifier::new(secret) {
            Ok(_) => println!("  ✅ Webhook secret valid"),
            Err(e) => {
                println!("  ❌ Webhook secret unusable: {e}");
                issues += 1;
            }
        },
        None => {
            println!("  ⚠️  No webhook secret, identity webhooks are accepted unsigned");
            issues += 1;
        }
    }

    for name in config.pricing.keys() {
        if AssistantId::parse(name).is_none() {
            println!("  ⚠️  Pricing override for unknown assistant '{name}' is ignored");
            issues += 1;
        }
    }

    match SqliteStore::new(&config.database.url).await {
        Ok(_) => println!("  ✅ Database reachable ({})", config.database.url),
        Err(e) => {
            println!("  ❌ Database error: {e}");
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
