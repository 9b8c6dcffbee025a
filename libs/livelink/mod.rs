//! # Livelink
//!
//! A persistent, self-healing WebSocket link between a desktop client and its
//! backend service.
//!
//! ## Features
//!
//! - **Single-owner actor**: One tokio task owns the socket, the state machine and every timer
//! - **Exponential backoff**: Pluggable reconnection strategy with an attempt cap
//! - **Liveness detection**: Application-level ping/pong with a latency EWMA
//! - **Offline queue**: Sends made while down are flushed in order on reconnect
//! - **Typed events**: Per-topic subscribers or crossbeam channels

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use self::core::{
    builder, client, config, connection_state, events, message, stats,
    builder::{states, LinkClientBuilder},
    client::LinkClient,
    config::ConnectionConfig,
    connection_state::{ConnectionState, ConnectionStatus},
    events::{EventBus, LinkEvent, SubscriptionId, Topic},
    message::{
        CancelOperation, Message, MessageType, Notification, ProgressUpdate, ServerError,
        TaskAssigned,
    },
    stats::Stats,
    tungstenite::TungsteniteConnector,
};
