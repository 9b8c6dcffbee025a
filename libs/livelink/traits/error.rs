use std::time::Duration;
use thiserror::Error;

/// Main error type for livelink
///
/// Every transport and parse fault is converted into one of these variants at
/// the connection boundary and re-emitted on the event bus. Only `connect()`
/// hands an error back to its caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    /// Handshake never completed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Handshake exceeded the configured bound
    #[error("Connection timed out after {0:?}")]
    ConnectionTimeout(Duration),

    /// Serialization or write failure; the message is dropped, never retried
    #[error("Failed to send message {message_id}: {reason}")]
    MessageSendFailed { message_id: String, reason: String },

    /// Malformed inbound payload; dropped without a state change
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Automatic retry halted
    #[error("Maximum reconnect attempts reached after {attempts} attempts")]
    MaxReconnectAttemptsReached { attempts: u32 },

    /// Liveness failure, forces a reconnect cycle
    #[error("No pong received within {0:?}")]
    PongTimeout(Duration),

    /// Error message pushed by the server
    #[error("Server error: {0}")]
    Server(String),

    /// No credential in the argument, the config or the auth provider
    #[error("No credential available for connection")]
    MissingCredential,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The connection manager was destroyed
    #[error("Connection manager has been destroyed")]
    Destroyed,

    /// Uncategorized transport fault
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl LinkError {
    /// Stable snake_case identifier, used when relaying errors out of process
    pub fn kind(&self) -> &'static str {
        match self {
            LinkError::ConnectionFailed(_) => "connection_failed",
            LinkError::ConnectionTimeout(_) => "connection_timeout",
            LinkError::MessageSendFailed { .. } => "message_send_failed",
            LinkError::InvalidMessage(_) => "invalid_message",
            LinkError::MaxReconnectAttemptsReached { .. } => "max_reconnect_attempts_reached",
            LinkError::PongTimeout(_) => "pong_timeout",
            LinkError::Server(_) => "server_error",
            LinkError::MissingCredential => "missing_credential",
            LinkError::Configuration(_) => "configuration",
            LinkError::Destroyed => "destroyed",
            LinkError::Unknown(_) => "unknown_error",
        }
    }

    /// True for errors that end automatic reconnection
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LinkError::MaxReconnectAttemptsReached { .. } | LinkError::Destroyed
        )
    }
}

impl From<serde_json::Error> for LinkError {
    fn from(e: serde_json::Error) -> Self {
        LinkError::InvalidMessage(e.to_string())
    }
}

/// Result type for livelink operations
pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_identifiers() {
        assert_eq!(LinkError::PongTimeout(Duration::from_secs(5)).kind(), "pong_timeout");
        assert_eq!(
            LinkError::MaxReconnectAttemptsReached { attempts: 3 }.kind(),
            "max_reconnect_attempts_reached"
        );
        assert_eq!(LinkError::Unknown("x".into()).kind(), "unknown_error");
    }

    #[test]
    fn test_terminal_errors() {
        assert!(LinkError::MaxReconnectAttemptsReached { attempts: 3 }.is_terminal());
        assert!(LinkError::Destroyed.is_terminal());
        assert!(!LinkError::PongTimeout(Duration::from_secs(5)).is_terminal());
    }

    #[test]
    fn test_json_error_maps_to_invalid_message() {
        let err: LinkError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, LinkError::InvalidMessage(_)));
    }
}
