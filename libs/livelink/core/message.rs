//! Wire envelope and typed payloads
//!
//! Every frame on the link is a JSON object:
//!
//! ```text
//! { "type": "progress_update", "payload": {...}, "messageId": "...",
//!   "timestamp": 1718000000000, "correlationId": "..." }
//! ```

use crate::traits::{LinkError, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Message kinds known to both ends of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Ping,
    Pong,
    CancelOperation,
    CustomPayload,
    ProgressUpdate,
    TaskAssigned,
    Notification,
    Error,
    /// Any type this client does not know; still delivered on the message topic
    #[serde(other)]
    Unknown,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
            MessageType::CancelOperation => "cancel_operation",
            MessageType::CustomPayload => "custom_payload",
            MessageType::ProgressUpdate => "progress_update",
            MessageType::TaskAssigned => "task_assigned",
            MessageType::Notification => "notification",
            MessageType::Error => "error",
            MessageType::Unknown => "unknown",
        }
    }
}

/// One envelope, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "type")]
    kind: MessageType,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    message_id: String,
    #[serde(default)]
    timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
}

impl Message {
    /// Build an outbound message with a fresh id and the current timestamp
    pub fn new(kind: MessageType, payload: Value, correlation_id: Option<String>) -> Self {
        Self {
            kind,
            payload,
            message_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().timestamp_millis(),
            correlation_id,
        }
    }

    /// Keepalive ping, correlated by timing rather than id
    pub fn ping() -> Self {
        Self::new(
            MessageType::Ping,
            json!({ "timestamp": Utc::now().timestamp_millis() }),
            None,
        )
    }

    /// Request the server to cancel a running operation
    pub fn cancel_operation(operation_id: &str, reason: Option<&str>) -> Self {
        let payload = CancelOperation {
            operation_id: operation_id.to_string(),
            reason: reason.map(str::to_string),
        };
        // Plain struct of strings, cannot fail to serialize
        let payload = serde_json::to_value(payload).unwrap_or(Value::Null);
        Self::new(MessageType::CancelOperation, payload, None)
    }

    pub fn kind(&self) -> MessageType {
        self.kind
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Epoch milliseconds
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Serialize to the text wire form
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| LinkError::MessageSendFailed {
            message_id: self.message_id.clone(),
            reason: e.to_string(),
        })
    }

    /// Parse the text wire form
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| LinkError::InvalidMessage(e.to_string()))
    }

    /// Deserialize the payload into a typed structure
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.payload).map_err(|e| {
            LinkError::InvalidMessage(format!("bad {} payload: {}", self.kind.as_str(), e))
        })
    }
}

/// client→server `cancel_operation` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOperation {
    pub operation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// server→client `progress_update` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub operation_id: String,
    /// Percentage, 0 to 100
    pub progress: f64,
    pub step: String,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<f64>,
}

impl ProgressUpdate {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.progress) {
            return Err(LinkError::InvalidMessage(format!(
                "progress {} for operation {} outside 0-100",
                self.progress, self.operation_id
            )));
        }
        Ok(())
    }
}

/// server→client `task_assigned` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssigned {
    pub task_id: String,
    pub task_type: String,
    pub description: String,
    #[serde(deserialize_with = "string_or_number")]
    pub priority: String,
}

/// server→client `notification` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub notification_id: String,
    pub title: String,
    pub message: String,
    pub level: String,
}

/// server→client `error` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    pub message: String,
}

/// Servers send priority either as a label or as a number
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}
