//! Configuration management for mindd.
//!
//! Loads settings from /etc/mind-devs/mindd.toml or uses defaults.

use anyhow::{Context, Result};
use mind_common::db::DEFAULT_DB_PATH;
use mind_common::ServiceSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/mind-devs/mindd.toml";

/// Default config file path for fallback
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/mind-devs/mindd.toml";

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind, localhost by default
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Largest accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_listen() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_body_bytes() -> usize {
    65_536 // lesson imports go through the CLI, not the API
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// SQLite configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// How long a writer waits for the lock before reporting a conflict
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_PATH)
}

fn default_busy_timeout() -> u64 {
    2_000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Outbound notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Mail relay endpoint; empty means log-only
    #[serde(default)]
    pub webhook_url: String,

    #[serde(default = "default_support_address")]
    pub support_address: String,

    #[serde(default = "default_sender")]
    pub sender: String,

    /// Relay request timeout in seconds
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,

    /// Lifetime of verification and recovery codes
    #[serde(default = "default_code_ttl")]
    pub code_ttl_minutes: i64,
}

fn default_support_address() -> String {
    "support@minddevs.local".to_string()
}

fn default_sender() -> String {
    "MIND DEVS <no-reply@minddevs.local>".to_string()
}

fn default_notify_timeout() -> u64 {
    5
}

fn default_code_ttl() -> i64 {
    10
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            support_address: default_support_address(),
            sender: default_sender(),
            timeout_secs: default_notify_timeout(),
            code_ttl_minutes: default_code_ttl(),
        }
    }
}

impl NotifyConfig {
    pub fn uses_webhook(&self) -> bool {
        !self.webhook_url.trim().is_empty()
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            sender: self.sender.clone(),
            support_address: self.support_address.clone(),
            code_ttl_minutes: self.code_ttl_minutes,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Config {
    /// Load config from an explicit path, else the standard locations, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        Ok(Self::load_from_path(Path::new(CONFIG_PATH))
            .or_else(|_| Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH)))
            .unwrap_or_else(|e| {
                warn!("Config not found, using defaults: {}", e);
                Config::default()
            }))
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save default config to path (for init)
    pub fn save_default(path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(&Config::default())?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, content)?;
        info!("Saved default config to {}", path.display());
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}
