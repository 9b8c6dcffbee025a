use crate::error::Result;
use async_trait::async_trait;

/// Raw WebSocket frame payload
/// Can be Text or Binary data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WsMessage {
    /// Get the message as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(s) => Some(s),
            WsMessage::Binary(_) => None,
        }
    }

    /// Size of the frame payload in bytes
    pub fn len(&self) -> usize {
        match self {
            WsMessage::Text(s) => s.len(),
            WsMessage::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Opens duplex connections
///
/// The connection manager owns exactly one `Connector` and asks it for a new
/// transport on every attempt. The returned future is raced against the
/// connection timeout and simply dropped when the timeout wins.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Perform the handshake against `url` presenting `token`
    async fn connect(&self, url: &str, token: &str) -> Result<Box<dyn Transport>>;
}

/// An open duplex connection
///
/// Owned and mutated exclusively by the connection manager.
#[async_trait]
pub trait Transport: Send {
    /// Write one frame
    async fn send(&mut self, frame: WsMessage) -> Result<()>;

    /// Read the next data frame
    ///
    /// Must be cancel safe.
    ///
    /// # Returns
    /// * `Some(Ok(frame))` - A frame arrived
    /// * `Some(Err(e))` - A transport fault; reported, does not close by itself
    /// * `None` - The peer closed the connection
    async fn recv(&mut self) -> Option<Result<WsMessage>>;

    /// Close the connection; errors are swallowed
    async fn close(&mut self);
}
