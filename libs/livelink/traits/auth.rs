use async_trait::async_trait;

/// Source of the bearer credential used at handshake time
///
/// Implement this trait to plug the application's authentication layer into
/// the connection manager. The provider is consulted whenever a connection
/// attempt starts and no credential has been supplied explicitly through
/// `connect(token)` or `update_token(token)`.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Get the current token
    ///
    /// # Returns
    /// * `Some(token)` - Use this credential for the handshake
    /// * `None` - No credential available; the attempt fails fast
    async fn current_token(&self) -> Option<String>;
}

/// Auth provider that always hands out the same token
#[derive(Debug, Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticToken {
    async fn current_token(&self) -> Option<String> {
        Some(self.token.clone())
    }
}

/// Auth provider with no credential at all
pub struct NoAuth;

#[async_trait]
impl AuthProvider for NoAuth {
    async fn current_token(&self) -> Option<String> {
        None
    }
}
