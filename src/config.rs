//! Link settings loaded from YAML and the environment
//!
//! ```yaml
//! url: wss://companion.example.com/link
//! auto_reconnect: true
//! reconnect_interval_ms: 1000
//! max_reconnect_interval_ms: 30000
//! reconnect_decay: 2.0
//! max_reconnect_attempts: 10   # 0 = unlimited
//! ping_interval_ms: 30000
//! pong_timeout_ms: 5000
//! connection_timeout_ms: 10000
//! max_queue_size: 1024         # 0 = unbounded
//! log_level: info
//! ```
//!
//! The credential never lives in YAML: it comes from `LINK_TOKEN`. `LINK_URL`
//! overrides `url`.

use livelink::config as defaults;
use livelink::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Environment variable holding the bearer credential
pub const TOKEN_ENV: &str = "LINK_TOKEN";
/// Environment variable overriding the URL
pub const URL_ENV: &str = "LINK_URL";

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Settings for one link, as written in the YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSettings {
    pub url: String,
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    #[serde(default = "default_max_reconnect_interval_ms")]
    pub max_reconnect_interval_ms: u64,
    #[serde(default = "default_reconnect_decay")]
    pub reconnect_decay: f64,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    #[serde(default = "default_pong_timeout_ms")]
    pub pong_timeout_ms: u64,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Bearer token from .env (not in YAML)
    #[serde(skip)]
    pub credential: Option<String>,
}

impl LinkSettings {
    /// Load configuration from YAML file, apply environment overrides, validate
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut settings = Self::from_yaml(&yaml_content)?;

        settings.apply_overrides(std::env::var(URL_ENV).ok(), std::env::var(TOKEN_ENV).ok());
        settings.validate()?;

        Ok(settings)
    }

    /// Parse YAML without touching the environment or validating
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply the `LINK_URL` / `LINK_TOKEN` values
    pub fn apply_overrides(&mut self, url: Option<String>, token: Option<String>) {
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            info!("Overriding link URL from environment variable");
            self.url = url;
        }

        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.credential = Some(token);
        }
    }

    /// Fail when no credential was provided
    pub fn require_credential(&self) -> Result<&str> {
        self.credential
            .as_deref()
            .ok_or_else(|| ConfigError::EnvVarMissing(TOKEN_ENV.to_string()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of {:?}, got '{}'",
                LOG_LEVELS, self.log_level
            )));
        }

        self.to_connection_config()
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Snapshot handed to the connection manager
    pub fn to_connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            url: self.url.clone(),
            credential: self.credential.clone(),
            auto_reconnect: self.auto_reconnect,
            reconnect_interval: Duration::from_millis(self.reconnect_interval_ms),
            max_reconnect_interval: Duration::from_millis(self.max_reconnect_interval_ms),
            reconnect_decay: self.reconnect_decay,
            max_reconnect_attempts: self.max_reconnect_attempts,
            ping_interval: Duration::from_millis(self.ping_interval_ms),
            pong_timeout: Duration::from_millis(self.pong_timeout_ms),
            connection_timeout: Duration::from_millis(self.connection_timeout_ms),
            max_queue_size: self.max_queue_size,
        }
    }

    /// Log the effective settings, credential excluded
    pub fn log(&self) {
        info!("Link configuration:");
        info!("  URL: {}", self.url);
        info!(
            "  Credential: {}",
            if self.credential.is_some() { "set" } else { "missing" }
        );
        info!(
            "  Reconnect: {} (base {}ms, max {}ms, decay {}, attempts {})",
            self.auto_reconnect,
            self.reconnect_interval_ms,
            self.max_reconnect_interval_ms,
            self.reconnect_decay,
            self.max_reconnect_attempts
        );
        info!(
            "  Keepalive: ping every {}ms, pong within {}ms",
            self.ping_interval_ms, self.pong_timeout_ms
        );
        info!("  Connection timeout: {}ms", self.connection_timeout_ms);
        info!("  Queue bound: {}", self.max_queue_size);
    }
}

fn default_true() -> bool {
    true
}

fn default_reconnect_interval_ms() -> u64 {
    defaults::DEFAULT_RECONNECT_INTERVAL.as_millis() as u64
}

fn default_max_reconnect_interval_ms() -> u64 {
    defaults::DEFAULT_MAX_RECONNECT_INTERVAL.as_millis() as u64
}

fn default_reconnect_decay() -> f64 {
    defaults::DEFAULT_RECONNECT_DECAY
}

fn default_max_reconnect_attempts() -> u32 {
    defaults::DEFAULT_MAX_RECONNECT_ATTEMPTS
}

fn default_ping_interval_ms() -> u64 {
    defaults::DEFAULT_PING_INTERVAL.as_millis() as u64
}

fn default_pong_timeout_ms() -> u64 {
    defaults::DEFAULT_PONG_TIMEOUT.as_millis() as u64
}

fn default_connection_timeout_ms() -> u64 {
    defaults::DEFAULT_CONNECTION_TIMEOUT.as_millis() as u64
}

fn default_max_queue_size() -> usize {
    defaults::DEFAULT_MAX_QUEUE_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}
