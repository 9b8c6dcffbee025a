pub mod states;

use super::client::LinkClient;
use super::config::ConnectionConfig;
use super::tungstenite::TungsteniteConnector;
use crate::traits::*;
use states::*;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Type-state builder for [`LinkClient`]
///
/// The URL must be set before `build()` is available. Every timing knob
/// defaults to the values in [`ConnectionConfig::new`].
pub struct LinkClientBuilder<E: EndpointState> {
    _endpoint: PhantomData<E>,
    config: ConnectionConfig,
    connector: Option<Arc<dyn Connector>>,
    auth: Option<Arc<dyn AuthProvider>>,
    headers: Option<Arc<dyn HeaderProvider>>,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
}

impl LinkClientBuilder<NoEndpoint> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _endpoint: PhantomData,
            config: ConnectionConfig::new(""),
            connector: None,
            auth: None,
            headers: None,
            reconnect_strategy: None,
        }
    }

    pub fn url(self, url: impl Into<String>) -> LinkClientBuilder<WithEndpoint> {
        let mut config = self.config;
        config.url = url.into();
        LinkClientBuilder {
            _endpoint: PhantomData,
            config,
            connector: self.connector,
            auth: self.auth,
            headers: self.headers,
            reconnect_strategy: self.reconnect_strategy,
        }
    }

    /// Start from a complete configuration, URL included
    pub fn config(self, config: ConnectionConfig) -> LinkClientBuilder<WithEndpoint> {
        LinkClientBuilder {
            _endpoint: PhantomData,
            config,
            connector: self.connector,
            auth: self.auth,
            headers: self.headers,
            reconnect_strategy: self.reconnect_strategy,
        }
    }
}

impl Default for LinkClientBuilder<NoEndpoint> {
    fn default() -> Self {
        Self::new()
    }
}

// Optional configuration methods
impl<E: EndpointState> LinkClientBuilder<E> {
    pub fn credential(mut self, token: impl Into<String>) -> Self {
        self.config.credential = Some(token.into());
        self
    }

    /// Credential source consulted when no explicit token is set
    pub fn auth(mut self, auth: impl AuthProvider + 'static) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    /// Extra handshake headers for the default WebSocket connector
    pub fn headers(mut self, provider: impl HeaderProvider + 'static) -> Self {
        self.headers = Some(Arc::new(provider));
        self
    }

    /// Replace the WebSocket connector (tests use an in-memory one)
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Replace the backoff built from the reconnect settings
    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect_interval = interval;
        self
    }

    pub fn max_reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.max_reconnect_interval = interval;
        self
    }

    pub fn reconnect_decay(mut self, decay: f64) -> Self {
        self.config.reconnect_decay = decay;
        self
    }

    /// Retry cap (0 = unlimited)
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.config.ping_interval = interval;
        self
    }

    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.config.pong_timeout = timeout;
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Outbound queue bound (0 = unbounded)
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.config.max_queue_size = size;
        self
    }
}

// Build method - only available once the URL is set
impl LinkClientBuilder<WithEndpoint> {
    /// Validate the configuration and spawn the connection manager
    ///
    /// Must be called inside a tokio runtime. The client starts disconnected;
    /// call [`LinkClient::connect`] to open the link.
    pub fn build(self) -> Result<LinkClient> {
        self.config.validate()?;

        let reconnect_strategy = self.reconnect_strategy.unwrap_or_else(|| {
            Box::new(ExponentialBackoff::new(
                self.config.reconnect_interval,
                self.config.max_reconnect_interval,
                self.config.reconnect_decay,
                self.config.max_reconnect_attempts,
            ))
        });

        let connector: Arc<dyn Connector> = match (self.connector, self.headers) {
            (Some(connector), None) => connector,
            (Some(connector), Some(_)) => {
                warn!("Custom connector set, header provider ignored");
                connector
            }
            (None, Some(headers)) => Arc::new(TungsteniteConnector::new().headers(headers)),
            (None, None) => Arc::new(TungsteniteConnector::new()),
        };

        Ok(LinkClient::spawn(
            self.config,
            connector,
            self.auth,
            reconnect_strategy,
        ))
    }
}
