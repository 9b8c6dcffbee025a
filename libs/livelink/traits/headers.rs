use async_trait::async_trait;
use std::collections::HashMap;

/// Extra handshake headers, name to value
pub type Headers = HashMap<String, String>;

/// Source of extra headers for the WebSocket handshake
///
/// Asked again before every attempt, reconnections included. The bearer
/// credential is set after these and replaces any `Authorization` entry.
///
/// A plain [`Headers`] map is a provider that never changes:
///
/// ```ignore
/// let mut headers = Headers::new();
/// headers.insert("X-Client-Version".into(), env!("CARGO_PKG_VERSION").into());
///
/// let client = livelink::builder()
///     .url("wss://companion.example.com/link")
///     .headers(headers)
///     .build()?;
/// ```
#[async_trait]
pub trait HeaderProvider: Send + Sync {
    async fn handshake_headers(&self) -> Headers;
}

#[async_trait]
impl HeaderProvider for Headers {
    async fn handshake_headers(&self) -> Headers {
        self.clone()
    }
}
