//! `hikewise serve`: Start the HTTP gateway.

use std::path::Path;

use hikewise_core::AssistantId;

use super::load_config;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🥾 HikeWise Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Database:  {}", config.database.url);
    for assistant in AssistantId::ALL {
        let key = match assistant {
            AssistantId::Nora => config.nora_api_key(),
            AssistantId::Patrick => config.patrick_api_key(),
        };
        let mode = if key.is_some_and(|k| !k.is_empty()) {
            "upstream"
        } else {
            "fallback only"
        };
        println!("   {:<9}  {mode}", format!("{}:", assistant.display_name()));
    }
    println!(
        "   Webhooks:  {}",
        if config.webhook.secret.is_some() {
            "signed"
        } else {
            "unverified"
        }
    );

    hikewise_gateway::start(config).await?;

    Ok(())
}
