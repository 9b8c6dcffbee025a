use super::config::ConnectionConfig;
use super::connection::{Command, ConnectionManager, SharedView};
use super::connection_state::ConnectionState;
use super::events::{EventBus, LinkEvent, SubscriptionId, Topic};
use super::message::{Message, MessageType};
use super::stats::{Stats, StatsCollector};
use crate::traits::*;
use crossbeam_channel::Receiver;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to one persistent link
///
/// Owns the connection manager task. All mutating calls are forwarded to that
/// task; only [`LinkClient::connect`] and [`LinkClient::destroy`] wait for it.
/// Queries read copies the task publishes after every change.
///
/// Not reusable after [`LinkClient::destroy`]: further calls are no-ops and
/// `connect()` fails with [`LinkError::Destroyed`].
pub struct LinkClient {
    commands: mpsc::UnboundedSender<Command>,
    view: SharedView,
    destroyed: AtomicBool,
    task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl LinkClient {
    /// Spawn the manager task; must be called inside a tokio runtime
    ///
    /// Use `livelink::builder()` to create a client.
    pub(crate) fn spawn(
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
        auth: Option<Arc<dyn AuthProvider>>,
        strategy: Box<dyn ReconnectionStrategy>,
    ) -> Self {
        let view = SharedView {
            state: Arc::new(RwLock::new(ConnectionState::default())),
            stats: Arc::new(StatsCollector::new()),
            bus: Arc::new(EventBus::new()),
            pending_timers: Arc::new(AtomicUsize::new(0)),
        };
        let (commands, inbox) = mpsc::unbounded_channel();

        let manager =
            ConnectionManager::new(config, connector, auth, strategy, view.clone(), inbox);
        let task_handle = tokio::spawn(manager.run());

        Self {
            commands,
            view,
            destroyed: AtomicBool::new(false),
            task_handle: Mutex::new(Some(task_handle)),
        }
    }

    /// Open the link
    ///
    /// `token` replaces the configured credential. Resolves once connected, or
    /// with the error of the attempt if the handshake fails or times out (the
    /// reconnection schedule keeps running behind it when auto-reconnect is on).
    /// Immediately `Ok` when already connected.
    pub async fn connect(&self, token: Option<String>) -> Result<()> {
        if self.is_destroyed() {
            return Err(LinkError::Destroyed);
        }

        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Connect { token, reply })
            .map_err(|_| LinkError::Destroyed)?;

        response.await.map_err(|_| LinkError::Destroyed)?
    }

    /// Close the link and stop reconnecting until the next `connect()`
    pub fn disconnect(&self) {
        self.command(Command::Disconnect, "disconnect");
    }

    /// Send a message, queueing it while not connected
    ///
    /// Returns the generated message id. Never blocks; delivery failures are
    /// reported on the error topic.
    pub fn send(
        &self,
        kind: MessageType,
        payload: Value,
        correlation_id: Option<String>,
    ) -> String {
        self.send_message(Message::new(kind, payload, correlation_id))
    }

    /// Send an application-defined `custom_payload`
    pub fn send_custom(&self, payload: Value, correlation_id: Option<String>) -> String {
        self.send(MessageType::CustomPayload, payload, correlation_id)
    }

    /// Ask the server to cancel a running operation
    pub fn cancel_operation(&self, operation_id: &str, reason: Option<&str>) -> String {
        self.send_message(Message::cancel_operation(operation_id, reason))
    }

    fn send_message(&self, message: Message) -> String {
        let id = message.message_id().to_string();
        self.command(Command::Send(message), "send");
        id
    }

    /// Replace the credential; an open link is cycled to present it
    pub fn update_token(&self, token: impl Into<String>) {
        self.command(Command::UpdateToken(token.into()), "update_token");
    }

    fn command(&self, cmd: Command, name: &str) {
        if self.is_destroyed() {
            warn!("{}() called on a destroyed client, ignoring", name);
            return;
        }

        if self.commands.send(cmd).is_err() {
            warn!("{}() dropped, connection manager is gone", name);
        }
    }

    /// Point-in-time copy of the connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.view.state.read().clone()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.view.state.read().is_connected()
    }

    /// Point-in-time copy of the counters
    pub fn stats(&self) -> Stats {
        self.view.stats.snapshot()
    }

    /// The event bus, for subscribing and unsubscribing
    pub fn events(&self) -> &EventBus {
        &self.view.bus
    }

    pub fn subscribe<F>(&self, topic: Topic, callback: F) -> SubscriptionId
    where
        F: Fn(&LinkEvent) + Send + Sync + 'static,
    {
        self.view.bus.subscribe(topic, callback)
    }

    /// Receive one topic on any thread
    ///
    /// Dropping the receiver ends the subscription at the next publish on
    /// `topic`. Use [`EventBus::subscribe_channel`] through [`Self::events`]
    /// to also get the id.
    pub fn subscribe_channel(&self, topic: Topic) -> Receiver<LinkEvent> {
        self.view.bus.subscribe_channel(topic).1
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.view.bus.unsubscribe(id)
    }

    /// Scheduled timers the manager currently holds
    pub fn pending_timer_count(&self) -> usize {
        self.view.pending_timers.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Terminal shutdown
    ///
    /// Disconnects, cancels every timer, discards queued messages and detaches
    /// every subscriber. Waits for the manager task to exit. Idempotent.
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            debug!("destroy() called twice, ignoring");
            return;
        }

        info!("Destroying link client");
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Destroy { reply }).is_ok() {
            let _ = done.await;
        }

        let handle = self.task_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for LinkClient {
    fn drop(&mut self) {
        // Dropping the command sender ends the manager loop on its own
        if !self.is_destroyed() {
            debug!("LinkClient dropped without destroy()");
        }
    }
}

impl std::fmt::Debug for LinkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkClient")
            .field("status", &self.view.state.read().status)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
