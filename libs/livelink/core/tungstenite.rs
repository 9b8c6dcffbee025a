use crate::traits::*;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::tungstenite::Message as TungMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connector backed by tokio-tungstenite
///
/// The credential goes out as `Authorization: Bearer <token>` on the
/// upgrade request, after any headers from the optional [`HeaderProvider`].
#[derive(Default)]
pub struct TungsteniteConnector {
    headers: Option<Arc<dyn HeaderProvider>>,
}

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add extra handshake headers, re-evaluated on every attempt
    pub fn headers(mut self, provider: Arc<dyn HeaderProvider>) -> Self {
        self.headers = Some(provider);
        self
    }

    async fn build_request(&self, url: &str, token: &str) -> Result<Request> {
        let mut request = url
            .into_client_request()
            .map_err(|e| LinkError::ConnectionFailed(format!("Invalid URL {}: {}", url, e)))?;

        if let Some(ref provider) = self.headers {
            for (key, value) in provider.handshake_headers().await {
                insert_header(&mut request, &key, &value);
            }
        }

        let bearer = format!("Bearer {}", token);
        match http::HeaderValue::from_str(&bearer) {
            Ok(value) => {
                request
                    .headers_mut()
                    .insert(http::header::AUTHORIZATION, value);
            }
            Err(_) => {
                return Err(LinkError::ConnectionFailed(
                    "Credential contains characters not allowed in a header".to_string(),
                ));
            }
        }

        Ok(request)
    }
}

fn insert_header(request: &mut Request, key: &str, value: &str) {
    match key.parse::<http::header::HeaderName>() {
        Ok(header_name) => match value.parse::<http::header::HeaderValue>() {
            Ok(header_value) => {
                request.headers_mut().insert(header_name, header_value);
            }
            Err(_) => {
                warn!("Invalid header value for key '{}'", key);
            }
        },
        Err(_) => {
            warn!("Invalid header name: {}", key);
        }
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str, token: &str) -> Result<Box<dyn Transport>> {
        let request = self.build_request(url, token).await?;

        debug!("Opening WebSocket to {}", url);
        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| LinkError::ConnectionFailed(e.to_string()))?;
        debug!("Handshake complete with status {}", response.status());

        Ok(Box::new(TungsteniteTransport {
            stream,
            closed: false,
        }))
    }
}

/// One open tungstenite stream
pub struct TungsteniteTransport {
    stream: WsStream,
    /// Set once the stream faulted or ended; later reads report a close
    closed: bool,
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn send(&mut self, frame: WsMessage) -> Result<()> {
        let msg = match frame {
            WsMessage::Text(text) => TungMessage::Text(text),
            WsMessage::Binary(data) => TungMessage::Binary(data),
        };
        self.stream
            .send(msg)
            .await
            .map_err(|e| LinkError::ConnectionFailed(format!("Write failed: {}", e)))
    }

    async fn recv(&mut self) -> Option<Result<WsMessage>> {
        if self.closed {
            return None;
        }

        loop {
            match self.stream.next().await {
                Some(Ok(TungMessage::Text(text))) => return Some(Ok(WsMessage::Text(text))),
                Some(Ok(TungMessage::Binary(data))) => return Some(Ok(WsMessage::Binary(data))),
                // Protocol-level ping/pong is answered by tungstenite itself
                Some(Ok(TungMessage::Ping(_))) | Some(Ok(TungMessage::Pong(_))) => continue,
                Some(Ok(TungMessage::Frame(_))) => continue,
                Some(Ok(TungMessage::Close(frame))) => {
                    debug!("Server sent close frame: {:?}", frame);
                    self.closed = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.closed = true;
                    return Some(Err(LinkError::ConnectionFailed(format!(
                        "Read failed: {}",
                        e
                    ))));
                }
                None => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("Close handshake failed: {}", e);
        }
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_headers() -> Headers {
        let mut headers = Headers::new();
        headers.insert("X-Client-Version".to_string(), "1.2.3".to_string());
        headers.insert("Authorization".to_string(), "Basic nope".to_string());
        headers.insert("bad header".to_string(), "x".to_string());
        headers
    }

    #[tokio::test]
    async fn test_request_carries_bearer() {
        let connector = TungsteniteConnector::new();
        let request = connector
            .build_request("ws://localhost:9000/link", "secret")
            .await
            .unwrap();

        assert_eq!(
            request.headers().get("authorization").unwrap(),
            "Bearer secret"
        );
    }

    #[tokio::test]
    async fn test_bearer_wins_over_provided_headers() {
        let connector = TungsteniteConnector::new().headers(Arc::new(client_headers()));
        let request = connector
            .build_request("wss://example.com/link", "tok")
            .await
            .unwrap();

        assert_eq!(request.headers().get("x-client-version").unwrap(), "1.2.3");
        assert_eq!(request.headers().get("authorization").unwrap(), "Bearer tok");
        assert!(request.headers().get("bad header").is_none());
    }

    #[tokio::test]
    async fn test_rejects_bad_url() {
        let connector = TungsteniteConnector::new();
        let err = connector.build_request("not a url", "tok").await.unwrap_err();
        assert!(matches!(err, LinkError::ConnectionFailed(_)));
    }
}
