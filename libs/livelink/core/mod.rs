//! # Livelink core
//!
//! The connection manager and the components it orchestrates.
//!
//! ## Example
//!
//! ```rust,ignore
//! use livelink::{LinkEvent, MessageType, Topic};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> livelink::Result<()> {
//!     let client = livelink::builder()
//!         .url("wss://companion.example.com/link")
//!         .ping_interval(Duration::from_secs(30))
//!         .build()?;
//!
//!     let progress = client.subscribe_channel(Topic::ProgressUpdate);
//!
//!     client.connect(Some(token)).await?;
//!     client.send(MessageType::CustomPayload, json!({ "hello": "world" }), None);
//!
//!     while let Ok(LinkEvent::ProgressUpdate(p)) = progress.recv() {
//!         println!("{} at {}%", p.operation_id, p.progress);
//!     }
//!
//!     client.destroy().await;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection;
pub mod connection_state;
pub mod events;
pub mod keepalive;
pub mod message;
pub mod queue;
pub mod stats;
pub mod timers;
pub mod tungstenite;

// Re-export main types
pub use builder::{states, LinkClientBuilder};
pub use client::LinkClient;
pub use config::ConnectionConfig;
pub use connection_state::{ConnectionState, ConnectionStatus};
pub use events::{EventBus, LinkEvent, SubscriptionId, Topic};
pub use message::{
    CancelOperation, Message, MessageType, Notification, ProgressUpdate, ServerError,
    TaskAssigned,
};
pub use stats::{Stats, StatsCollector};
pub use tungstenite::{TungsteniteConnector, TungsteniteTransport};

/// Create a new link client builder
///
/// # Example
/// ```ignore
/// let client = livelink::builder()
///     .url("wss://companion.example.com/link")
///     .auth(MySessionTokens::new())
///     .max_reconnect_attempts(0)
///     .build()?;
/// ```
pub fn builder() -> LinkClientBuilder<states::NoEndpoint> {
    LinkClientBuilder::new()
}
