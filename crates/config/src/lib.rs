//! Configuration loading and validation for HikeWise.
//!
//! Loads configuration from `~/.hikewise/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.hikewise/config.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// External completion / speech-to-text endpoint
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Per-assistant keys and model overrides
    #[serde(default)]
    pub assistants: AssistantsConfig,

    /// HTTP gateway bind settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Persistence
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Identity-provider webhook
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Usage ledger settings
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Per-assistant pricing overrides (assistant id -> rates)
    #[serde(default)]
    pub pricing: HashMap<String, PricingOverrideConfig>,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("upstream", &self.upstream)
            .field("assistants", &self.assistants)
            .field("gateway", &self.gateway)
            .field("database", &self.database)
            .field("webhook", &self.webhook)
            .field("ledger", &self.ledger)
            .field("pricing", &self.pricing)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Shared key for the coaching assistant and transcription.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Client-side timeout for every upstream call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_timeout_secs() -> u64 {
    60
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantsConfig {
    #[serde(default)]
    pub nora: AssistantSettings,

    #[serde(default)]
    pub patrick: AssistantSettings,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AssistantSettings {
    /// Dedicated key; falls back to `upstream.api_key` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override for the default (fast) model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Override for the deep-thinking model (research assistant only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_model: Option<String>,
}

impl std::fmt::Debug for AssistantSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantSettings")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("deep_model", &self.deep_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Browser origins allowed by CORS. Native clients need none.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8787
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "sqlite://hikewise.db".into()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Signing secret (`whsec_<base64>`). Unset disables verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret", &redact(&self.secret))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Offset from UTC of the reference timezone for the calendar-date key.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

/// Custom per-thousand-token pricing for an assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingOverrideConfig {
    /// Price per 1K input tokens in USD
    pub input_per_k: f64,
    /// Price per 1K output tokens in USD
    pub output_per_k: f64,
}

const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

impl AppConfig {
    /// Load configuration from the default path (~/.hikewise/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Load from `path` if given, else the default path, then apply
    /// environment overrides:
    /// - `OPENAI_API_KEY_NEW_NORA`, then `OPENAI_API_KEY` (research key)
    /// - `OPENAI_API_KEY` (shared key)
    /// - `HIKEWISE_DATABASE_URL`, `HIKEWISE_WEBHOOK_SECRET`, `HIKEWISE_PORT`
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        let default_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(path.unwrap_or(&default_path))?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`. File values for keys
    /// win; deployment settings (database, webhook secret, port) are
    /// overridden by the environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.upstream.api_key.is_none() {
            self.upstream.api_key = non_empty("OPENAI_API_KEY");
        }
        if self.assistants.nora.api_key.is_none() {
            self.assistants.nora.api_key = non_empty("OPENAI_API_KEY_NEW_NORA");
        }
        if let Some(url) = non_empty("HIKEWISE_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(secret) = non_empty("HIKEWISE_WEBHOOK_SECRET") {
            self.webhook.secret = Some(secret);
        }
        if let Some(port) = non_empty("HIKEWISE_PORT") {
            match port.parse() {
                Ok(p) => self.gateway.port = p,
                Err(_) => tracing::warn!("Ignoring invalid HIKEWISE_PORT value '{port}'"),
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".hikewise")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "upstream.timeout_secs must be > 0".into(),
            ));
        }

        if self.ledger.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ConfigError::ValidationError(
                "ledger.utc_offset_minutes must be within +/-840".into(),
            ));
        }

        for (name, rates) in &self.pricing {
            if rates.input_per_k < 0.0 || rates.output_per_k < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "pricing.{name} rates must be non-negative"
                )));
            }
        }

        Ok(())
    }

    /// Key for the research assistant: its own key, else the shared key.
    pub fn nora_api_key(&self) -> Option<&str> {
        self.assistants
            .nora
            .api_key
            .as_deref()
            .or(self.upstream.api_key.as_deref())
    }

    /// Key for the coaching assistant: its own key, else the shared key.
    pub fn patrick_api_key(&self) -> Option<&str> {
        self.assistants
            .patrick
            .api_key
            .as_deref()
            .or(self.upstream.api_key.as_deref())
    }

    /// Key for speech-to-text.
    pub fn transcription_api_key(&self) -> Option<&str> {
        self.upstream.api_key.as_deref()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway.port, 8787);
        assert_eq!(config.upstream.timeout_secs, 60);
        assert_eq!(config.database.url, "sqlite://hikewise.db");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.upstream.base_url, config.upstream.base_url);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = AppConfig::default();
        config.upstream.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn utc_offset_bounds() {
        let mut config = AppConfig::default();
        config.ledger.utc_offset_minutes = -840;
        assert!(config.validate().is_ok());
        config.ledger.utc_offset_minutes = 841;
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_pricing_rejected() {
        let mut config = AppConfig::default();
        config.pricing.insert(
            "nora".into(),
            PricingOverrideConfig {
                input_per_k: -1.0,
                output_per_k: 0.01,
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.gateway.host, "127.0.0.1");
    }

    #[test]
    fn load_from_file_with_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[upstream]
base_url = "http://localhost:9000/v1"
timeout_secs = 5

[assistants.patrick]
model = "gpt-4o"

[ledger]
utc_offset_minutes = -300

[pricing.patrick]
input_per_k = 0.001
output_per_k = 0.002
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.upstream.base_url, "http://localhost:9000/v1");
        assert_eq!(config.upstream.timeout_secs, 5);
        assert_eq!(config.assistants.patrick.model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.ledger.utc_offset_minutes, -300);
        assert!((config.pricing["patrick"].output_per_k - 0.002).abs() < 1e-12);
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[upstream\nbase_url = 1").unwrap();
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn research_key_prefers_dedicated_env() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[
            ("OPENAI_API_KEY_NEW_NORA", "sk-nora"),
            ("OPENAI_API_KEY", "sk-shared"),
        ]));
        assert_eq!(config.nora_api_key(), Some("sk-nora"));
        assert_eq!(config.patrick_api_key(), Some("sk-shared"));
        assert_eq!(config.transcription_api_key(), Some("sk-shared"));
    }

    #[test]
    fn research_key_falls_back_to_shared() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("OPENAI_API_KEY", "sk-shared")]));
        assert_eq!(config.nora_api_key(), Some("sk-shared"));
    }

    #[test]
    fn empty_env_values_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("OPENAI_API_KEY", "  "), ("HIKEWISE_PORT", "nope")]));
        assert_eq!(config.nora_api_key(), None);
        assert_eq!(config.gateway.port, 8787);
    }

    #[test]
    fn deployment_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[
            ("HIKEWISE_DATABASE_URL", "sqlite::memory:"),
            ("HIKEWISE_WEBHOOK_SECRET", "whsec_abc"),
            ("HIKEWISE_PORT", "9001"),
        ]));
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.webhook.secret.as_deref(), Some("whsec_abc"));
        assert_eq!(config.gateway.port, 9001);
    }

    #[test]
    fn debug_redacts_keys() {
        let mut config = AppConfig::default();
        config.upstream.api_key = Some("sk-secret-value".into());
        config.assistants.nora.api_key = Some("sk-nora-secret".into());
        config.webhook.secret = Some("whsec_secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret-value"));
        assert!(!debug.contains("sk-nora-secret"));
        assert!(!debug.contains("whsec_secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
