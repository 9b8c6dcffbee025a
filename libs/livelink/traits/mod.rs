//! # Livelink Traits
//!
//! Seams between the connection manager and its collaborators:
//!
//! - **Connector / Transport**: Open and drive one duplex connection
//! - **AuthProvider**: Supply the bearer credential
//! - **HeaderProvider**: Add extra handshake headers
//! - **ReconnectionStrategy**: Decide retry delays and when to give up

pub mod auth;
pub mod error;
pub mod headers;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use auth::{AuthProvider, NoAuth, StaticToken};
pub use error::{LinkError, Result};
pub use headers::{HeaderProvider, Headers};
pub use reconnect::{ExponentialBackoff, ReconnectionStrategy};
pub use transport::{Connector, Transport, WsMessage};
