use crate::traits::{LinkError, Result};
use std::fmt;
use std::time::Duration;

/// Default delay before the first retry
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(1_000);
/// Default cap for retry delays
pub const DEFAULT_MAX_RECONNECT_INTERVAL: Duration = Duration::from_millis(30_000);
/// Default growth factor between retry delays
pub const DEFAULT_RECONNECT_DECAY: f64 = 2.0;
/// Default retry cap
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
/// Default keepalive cadence
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_millis(30_000);
/// Default time to wait for a pong
pub const DEFAULT_PONG_TIMEOUT: Duration = Duration::from_millis(5_000);
/// Default handshake bound
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Default outbound queue bound
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1_024;

/// Immutable connection settings
///
/// A snapshot: the connection manager never mutates it in place, it swaps in
/// a new value (see [`ConnectionConfig::with_credential`]) when the credential
/// rotates.
#[derive(Clone, PartialEq)]
pub struct ConnectionConfig {
    /// WebSocket URL (wss:// or ws://)
    pub url: String,
    /// Bearer token presented at handshake
    pub credential: Option<String>,
    /// Retry automatically after failures and unexpected closes
    pub auto_reconnect: bool,
    /// Delay before the first retry
    pub reconnect_interval: Duration,
    /// Cap for retry delays
    pub max_reconnect_interval: Duration,
    /// Growth factor between consecutive retry delays
    pub reconnect_decay: f64,
    /// Retry cap (0 = unlimited)
    pub max_reconnect_attempts: u32,
    /// Keepalive ping cadence
    pub ping_interval: Duration,
    /// How long to wait for a pong before declaring the link dead
    ///
    /// May exceed `ping_interval`: pings that fall due while a pong is still
    /// owed are skipped, so the deadline of the unanswered ping stands.
    pub pong_timeout: Duration,
    /// Handshake bound
    pub connection_timeout: Duration,
    /// Outbound queue bound (0 = unbounded)
    pub max_queue_size: usize,
}

impl ConnectionConfig {
    /// Create a configuration with default timings
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credential: None,
            auto_reconnect: true,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_interval: DEFAULT_MAX_RECONNECT_INTERVAL,
            reconnect_decay: DEFAULT_RECONNECT_DECAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            ping_interval: DEFAULT_PING_INTERVAL,
            pong_timeout: DEFAULT_PONG_TIMEOUT,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
        }
    }

    /// Return a new snapshot carrying `token` as the credential
    pub fn with_credential(&self, token: impl Into<String>) -> Self {
        Self {
            credential: Some(token.into()),
            ..self.clone()
        }
    }

    /// Validate configuration values
    ///
    /// `pong_timeout >= ping_interval` is accepted (see
    /// [`ConnectionConfig::pong_timeout`]).
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(LinkError::Configuration(format!(
                "url must start with ws:// or wss://, got '{}'",
                self.url
            )));
        }

        if self.reconnect_interval.is_zero() {
            return Err(LinkError::Configuration(
                "reconnect_interval must be greater than 0".to_string(),
            ));
        }

        if self.max_reconnect_interval < self.reconnect_interval {
            return Err(LinkError::Configuration(
                "max_reconnect_interval must be >= reconnect_interval".to_string(),
            ));
        }

        if !self.reconnect_decay.is_finite() || self.reconnect_decay < 1.0 {
            return Err(LinkError::Configuration(
                "reconnect_decay must be a finite number >= 1.0".to_string(),
            ));
        }

        if self.ping_interval.is_zero() || self.pong_timeout.is_zero() {
            return Err(LinkError::Configuration(
                "ping_interval and pong_timeout must be greater than 0".to_string(),
            ));
        }

        if self.connection_timeout.is_zero() {
            return Err(LinkError::Configuration(
                "connection_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// Hand-written so the credential never lands in logs
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("auto_reconnect", &self.auto_reconnect)
            .field("reconnect_interval", &self.reconnect_interval)
            .field("max_reconnect_interval", &self.max_reconnect_interval)
            .field("reconnect_decay", &self.reconnect_decay)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("ping_interval", &self.ping_interval)
            .field("pong_timeout", &self.pong_timeout)
            .field("connection_timeout", &self.connection_timeout)
            .field("max_queue_size", &self.max_queue_size)
            .finish()
    }
}
