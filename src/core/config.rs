use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::core::source::validate_endpoint;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_format")]
    pub default_format: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_format() -> String {
    "text".to_string()
}
fn default_color() -> String {
    "auto".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_format: default_format(),
            color: default_color(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between usage fetches
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval_secs: u64,
    /// Seconds between pacing recomputations
    #[serde(default = "default_pace_interval")]
    pub pace_interval_secs: u64,
    /// HTTP timeout for a single request
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_fetch_interval() -> u64 {
    120
}
fn default_pace_interval() -> u64 {
    300
}
fn default_timeout() -> u64 {
    15
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            fetch_interval_secs: default_fetch_interval(),
            pace_interval_secs: default_pace_interval(),
            timeout_secs: default_timeout(),
        }
    }
}

impl PollConfig {
    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs)
    }

    pub fn pace_interval(&self) -> Duration {
        Duration::from_secs(self.pace_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// File holding the raw `Cookie` header for claude.ai
    pub cookie_file: Option<PathBuf>,
}

fn default_base_url() -> String {
    "https://claude.ai".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cookie_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_message")]
    pub message: String,
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

fn default_program() -> String {
    "openclaw".to_string()
}
fn default_channel() -> String {
    "whatsapp".to_string()
}
fn default_message() -> String {
    "Claude quota is available again: the session window has reset.".to_string()
}
fn default_notify_timeout() -> u64 {
    30
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            channel: default_channel(),
            message: default_message(),
            timeout_secs: default_notify_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl AppConfig {
    /// Get the config file path, respecting XDG_CONFIG_HOME
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join(".config")
            });
        config_dir.join("quotawatch").join("config.toml")
    }

    /// Load config from the default path, falling back to defaults if not found
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Serialize and write this config to the config file path.
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Validate the config
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !["text", "json"].contains(&self.settings.default_format.as_str()) {
            issues.push(format!(
                "Invalid default_format: '{}' (must be 'text' or 'json')",
                self.settings.default_format
            ));
        }
        if !["auto", "always", "never"].contains(&self.settings.color.as_str()) {
            issues.push(format!(
                "Invalid color: '{}' (must be 'auto', 'always', or 'never')",
                self.settings.color
            ));
        }
        if self.poll.fetch_interval_secs == 0 {
            issues.push("poll.fetch_interval_secs must be greater than 0".to_string());
        }
        if self.poll.pace_interval_secs == 0 {
            issues.push("poll.pace_interval_secs must be greater than 0".to_string());
        }
        if self.poll.timeout_secs == 0 {
            issues.push("poll.timeout_secs must be greater than 0".to_string());
        }
        if let Err(e) = validate_endpoint(&self.source.base_url) {
            issues.push(format!("source.base_url: {}", e));
        }
        if self.notify.program.trim().is_empty() {
            issues.push("notify.program must not be empty".to_string());
        }
        issues
    }
}
