pub mod doctor;
pub mod serve;
pub mod tier;
pub mod usage;

use std::path::Path;

use hikewise_config::AppConfig;

pub(crate) fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load_with(path).map_err(|e| format!("Failed to load config: {e}"))?)
}
