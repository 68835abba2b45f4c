//! Configuration loading and validation for DeskClaw.
//!
//! Loads configuration from `~/.deskclaw/config.toml` with environment
//! variable overrides. A missing API key or an unknown tool version is a
//! fatal [`ConfigError`] raised before the agent loop ever starts.

use deskclaw_core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The root configuration structure.
///
/// Maps directly to `~/.deskclaw/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Anthropic API key. Overridden by `ANTHROPIC_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier sent to the provider.
    #[serde(default = "default_model")]
    pub model: String,

    /// Max tokens per model response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Safety cap on tool iterations within one user utterance.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Which tool version group to activate (e.g. "computer_use_20250124").
    #[serde(default = "default_tool_version")]
    pub tool_version: String,

    /// Target display geometry for the computer capability.
    #[serde(default)]
    pub display: DisplayConfig,

    /// Gateway configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Persistence configuration.
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_max_iterations() -> u32 {
    25
}
fn default_tool_version() -> String {
    "computer_use_20250124".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_display_width")]
    pub width: u32,
    #[serde(default = "default_display_height")]
    pub height: u32,
}

fn default_display_width() -> u32 {
    1024
}
fn default_display_height() -> u32 {
    768
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_display_width(),
            height: default_display_height(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path. Overridden by `DESKCLAW_DB`.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_database_path() -> String {
    "chat.db".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
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
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("max_iterations", &self.max_iterations)
            .field("tool_version", &self.tool_version)
            .field("display", &self.display)
            .field("gateway", &self.gateway)
            .field("store", &self.store)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            max_iterations: default_max_iterations(),
            tool_version: default_tool_version(),
            display: DisplayConfig::default(),
            gateway: GatewayConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl AppConfig {
    /// The default config file location: `~/.deskclaw/config.toml`.
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        Path::new(&home).join(".deskclaw").join("config.toml")
    }

    /// Load configuration from the default path (or defaults if the file
    /// doesn't exist), then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path())
    }

    /// Load from an explicit path; a missing file falls back to defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            toml::from_str(&raw).map_err(|e| ConfigError::Invalid(e.to_string()))?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    /// Environment overrides take precedence over the file.
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("DESKCLAW_MODEL") {
            if !model.is_empty() {
                self.model = model;
            }
        }
        if let Ok(db) = std::env::var("DESKCLAW_DB") {
            if !db.is_empty() {
                self.store.database_path = db;
            }
        }
    }

    /// Validate everything the agent loop needs before it starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingCredentials(
                "ANTHROPIC_API_KEY not found".into(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be positive".into()));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "max_iterations must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.tool_version, "computer_use_20250124");
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.gateway.port, 8000);
    }

    #[test]
    fn missing_api_key_fails_validation() {
        let config = AppConfig {
            api_key: None,
            ..AppConfig::default()
        };
        // ANTHROPIC_API_KEY may leak in from the environment; only assert
        // when it isn't set.
        if std::env::var("ANTHROPIC_API_KEY").is_err() {
            assert!(matches!(
                config.validate(),
                Err(ConfigError::MissingCredentials(_))
            ));
        }
    }

    #[test]
    fn valid_config_passes() {
        let config = AppConfig {
            api_key: Some("sk-ant-test".into()),
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
model = "claude-test"
max_tokens = 2048

[gateway]
port = 9000

[store]
database_path = "/tmp/test.db"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.max_tokens, 2048);
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.store.database_path, "/tmp/test.db");
        // Unspecified fields keep defaults
        assert_eq!(config.tool_version, "computer_use_20250124");
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_tokens = \"not a number\"").unwrap();
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-ant-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-ant-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
