//! Configuration loading for the engine.
//!
//! Settings are loaded from a TOML file. Every field has a default, so an
//! empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Drains larger than this many calls are logged as a backlog.
pub const DEFAULT_BACKLOG_WARNING: usize = 256;

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub group_thread: GroupThreadConfig,
    #[serde(default)]
    pub mailbox: MailboxConfig,
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Settings for the group processing context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupThreadConfig {
    /// Milliseconds between processing passes when driven by `GroupThread::run`
    pub tick_interval_ms: u64,
}

impl GroupThreadConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Default for GroupThreadConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
        }
    }
}

/// Mailbox settings shared by every agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// Number of calls in one drain above which a warning is logged
    pub backlog_warning: usize,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            backlog_warning: DEFAULT_BACKLOG_WARNING,
        }
    }
}

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Returns the default configuration as a TOML string.
pub fn default_config_toml() -> String {
    // Plain integers and tables only; serialization cannot fail.
    EngineConfig::default().to_toml().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.group_thread.tick_interval(), Duration::from_millis(50));
        assert_eq!(config.mailbox.backlog_warning, DEFAULT_BACKLOG_WARNING);
    }

    #[test]
    fn test_partial_config() {
        let config = EngineConfig::from_str(
            r#"
            [group_thread]
            tick_interval_ms = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.group_thread.tick_interval_ms, 10);
        assert_eq!(config.mailbox.backlog_warning, DEFAULT_BACKLOG_WARNING);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = GroupThreadConfig { tick_interval_ms: 0 };
        assert_eq!(config.tick_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_default_toml_round_trips() {
        let toml = default_config_toml();
        assert!(toml.contains("tick_interval_ms"));
        assert_eq!(EngineConfig::from_str(&toml).unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_bad_toml_rejected() {
        let err = EngineConfig::from_str("[mailbox]\nbacklog_warning = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
