//! Connection manager actor
//!
//! # Architecture
//!
//! ```text
//! LinkClient (any task) ──Command──> mpsc inbox ──┐
//!                                                  │
//!      ┌───────────────── select! ─────────────────┤
//!      │ commands │ handshake │ transport frames │ earliest timer
//!      └──────────────────────┬────────────────────┘
//!                             v
//!        state machine, keepalive, queue, stats ──> EventBus
//! ```
//!
//! Every transition, timer expiry and transport callback runs on this one
//! task, so handlers take `&mut self` and never lock the state machine. The
//! handle only sees the copies in [`SharedView`].
//!
//! Every await inside a handler is bounded: transport writes and the close
//! handshake by `pong_timeout`, the auth provider by `connection_timeout`.
//! A write that runs out of time closes the transport.

use super::config::ConnectionConfig;
use super::connection_state::{ConnectionState, ConnectionStatus};
use super::events::{EventBus, LinkEvent};
use super::keepalive::KeepaliveMonitor;
use super::message::{Message, MessageType, Notification, ProgressUpdate, ServerError, TaskAssigned};
use super::queue::OutboundQueue;
use super::stats::StatsCollector;
use super::timers::{TimerKind, Timers};
use crate::traits::*;
use chrono::Utc;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Requests from the handle to the manager task
#[derive(Debug)]
pub(crate) enum Command {
    Connect {
        token: Option<String>,
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect,
    Send(Message),
    UpdateToken(String),
    Destroy {
        reply: oneshot::Sender<()>,
    },
}

/// State shared read-only with the handle
#[derive(Clone)]
pub(crate) struct SharedView {
    pub state: Arc<RwLock<ConnectionState>>,
    pub stats: Arc<StatsCollector>,
    pub bus: Arc<EventBus>,
    pub pending_timers: Arc<AtomicUsize>,
}

type PendingConnect = BoxFuture<'static, Result<Box<dyn Transport>>>;

/// Outcome of one transport write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Written {
    Sent,
    /// Rejected by the transport; the link may still be usable
    Failed,
    /// Did not complete within `pong_timeout`; the peer stopped reading
    Stalled,
}

/// What woke the event loop
enum Wake {
    Command(Option<Command>),
    Handshake(Result<Box<dyn Transport>>),
    Frame(Option<Result<WsMessage>>),
    TimerDue,
}

pub(crate) struct ConnectionManager {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    auth: Option<Arc<dyn AuthProvider>>,
    strategy: Box<dyn ReconnectionStrategy>,
    state: ConnectionState,
    view: SharedView,
    queue: OutboundQueue,
    keepalive: KeepaliveMonitor,
    timers: Timers,
    transport: Option<Box<dyn Transport>>,
    pending_connect: Option<PendingConnect>,
    connect_waiters: Vec<oneshot::Sender<Result<()>>>,
    /// Session flag: cleared by `disconnect()`, restored by `connect()`
    auto_reconnect: bool,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl ConnectionManager {
    pub(crate) fn new(
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
        auth: Option<Arc<dyn AuthProvider>>,
        strategy: Box<dyn ReconnectionStrategy>,
        view: SharedView,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            queue: OutboundQueue::new(config.max_queue_size),
            keepalive: KeepaliveMonitor::new(config.ping_interval, config.pong_timeout),
            auto_reconnect: config.auto_reconnect,
            config,
            connector,
            auth,
            strategy,
            state: ConnectionState::default(),
            view,
            timers: Timers::new(),
            transport: None,
            pending_connect: None,
            connect_waiters: Vec::new(),
            commands,
        }
    }

    /// Main loop; returns after `Destroy` or when every handle is gone
    pub(crate) async fn run(mut self) {
        debug!("Connection manager started for {}", self.config.url);

        loop {
            self.sync_view();
            let deadline = self.timers.next_deadline();

            let wake = tokio::select! {
                biased;
                cmd = self.commands.recv() => Wake::Command(cmd),
                outcome = handshake(&mut self.pending_connect) => Wake::Handshake(outcome),
                frame = next_frame(&mut self.transport) => Wake::Frame(frame),
                _ = sleep_until(deadline) => Wake::TimerDue,
            };

            match wake {
                Wake::Command(Some(cmd)) => match cmd {
                    Command::Connect { token, reply } => self.on_connect(token, reply).await,
                    Command::Disconnect => self.on_disconnect("client disconnect").await,
                    Command::Send(message) => self.on_send(message).await,
                    Command::UpdateToken(token) => self.on_update_token(token).await,
                    Command::Destroy { reply } => {
                        self.teardown().await;
                        let _ = reply.send(());
                        break;
                    }
                },
                Wake::Command(None) => {
                    debug!("All handles dropped, tearing down");
                    self.teardown().await;
                    break;
                }
                Wake::Handshake(outcome) => {
                    self.pending_connect = None;
                    self.on_handshake(outcome).await;
                }
                Wake::Frame(Some(Ok(frame))) => self.on_frame(frame).await,
                Wake::Frame(Some(Err(e))) => {
                    warn!("Transport error: {}", e);
                    self.report(e);
                }
                Wake::Frame(None) => self.force_close("connection closed by server").await,
                Wake::TimerDue => {
                    while let Some(kind) = self.timers.pop_expired(Instant::now()) {
                        self.on_timer(kind).await;
                    }
                }
            }
        }

        self.sync_view();
        info!("Connection manager exiting");
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    async fn on_connect(&mut self, token: Option<String>, reply: oneshot::Sender<Result<()>>) {
        if let Some(token) = token {
            self.config = self.config.with_credential(token);
        }

        match self.state.status {
            ConnectionStatus::Connected => {
                debug!("connect() while connected, nothing to do");
                let _ = reply.send(Ok(()));
            }
            ConnectionStatus::Connecting => {
                debug!("connect() while a handshake is in flight, waiting on it");
                self.connect_waiters.push(reply);
            }
            ConnectionStatus::Disconnected
            | ConnectionStatus::Disconnecting
            | ConnectionStatus::Reconnecting => {
                let Some(token) = self.credential().await else {
                    warn!("connect() without a credential");
                    self.state.last_error = Some(LinkError::MissingCredential);
                    let _ = reply.send(Err(LinkError::MissingCredential));
                    return;
                };

                self.auto_reconnect = self.config.auto_reconnect;
                if self.timers.cancel(TimerKind::Reconnect) {
                    debug!("Reconnect timer pre-empted by connect()");
                }
                self.connect_waiters.push(reply);
                self.start_attempt(token);
            }
        }
    }

    async fn on_disconnect(&mut self, reason: &str) {
        self.auto_reconnect = false;
        self.halt(reason).await;
        self.fail_waiters(LinkError::ConnectionFailed(
            "Disconnected before the connection opened".to_string(),
        ));
    }

    async fn on_send(&mut self, message: Message) {
        if self.state.is_connected() && self.transport.is_some() {
            if self.write(message).await == Written::Stalled {
                self.force_close("write stalled").await;
            }
            return;
        }

        debug!(
            message_id = message.message_id(),
            status = %self.state.status,
            "Queueing message while not connected"
        );
        if let Some(evicted) = self.queue.push(message) {
            warn!(
                "Outbound queue full ({}), dropping oldest message {}",
                self.queue.capacity(),
                evicted.message_id()
            );
            self.view.stats.record_dropped();
            self.report(LinkError::MessageSendFailed {
                message_id: evicted.message_id().to_string(),
                reason: "outbound queue full".to_string(),
            });
        }
    }

    async fn on_update_token(&mut self, token: String) {
        self.config = self.config.with_credential(token);
        info!("Credential updated");

        if self.state.is_connected() {
            // Full cycle so the new credential is presented at handshake
            let auto_reconnect = self.auto_reconnect;
            self.halt("credential rotated").await;
            self.auto_reconnect = auto_reconnect;

            match self.credential().await {
                Some(token) => self.start_attempt(token),
                None => self.on_attempt_failed(LinkError::MissingCredential),
            }
        }
    }

    // ------------------------------------------------------------------
    // Handshake
    // ------------------------------------------------------------------

    fn start_attempt(&mut self, token: String) {
        self.transition(ConnectionStatus::Connecting);
        self.timers
            .arm(TimerKind::ConnectTimeout, self.config.connection_timeout);

        let connector = Arc::clone(&self.connector);
        let url = self.config.url.clone();
        info!(
            attempt = self.state.reconnect_attempts,
            "Connecting to {}", url
        );

        self.pending_connect = Some(Box::pin(async move {
            connector.connect(&url, &token).await
        }));
    }

    async fn on_handshake(&mut self, outcome: Result<Box<dyn Transport>>) {
        self.timers.cancel(TimerKind::ConnectTimeout);

        match outcome {
            Ok(transport) => self.on_open(transport).await,
            Err(e) => {
                error!("Failed to connect: {}", e);
                self.on_attempt_failed(e);
            }
        }
    }

    async fn on_open(&mut self, transport: Box<dyn Transport>) {
        let now = Utc::now();
        self.transport = Some(transport);
        self.state.reconnect_attempts = 0;
        self.state.connected_at = Some(now);
        self.state.last_activity = Some(now);
        self.transition(ConnectionStatus::Connected);
        self.view.stats.mark_connected();
        self.keepalive.start(&mut self.timers);

        info!("Connected to {}", self.config.url);
        self.publish(LinkEvent::Connected);

        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }

        self.flush_queue().await;
    }

    /// A handshake failed or timed out
    fn on_attempt_failed(&mut self, err: LinkError) {
        self.report(err.clone());
        self.fail_waiters(err.clone());

        if self.auto_reconnect {
            self.schedule_reconnect();
        } else {
            self.settle_disconnected(&err.to_string());
        }
    }

    /// Reconnection scheduler: count the failure and arm the retry timer
    fn schedule_reconnect(&mut self) {
        let attempt = self.state.reconnect_attempts.saturating_add(1);

        let delay = if self.strategy.should_reconnect(attempt) {
            self.strategy.next_delay(attempt)
        } else {
            None
        };

        match delay {
            Some(delay) => {
                self.state.reconnect_attempts = attempt;
                self.timers.arm(TimerKind::Reconnect, delay);
                self.transition(ConnectionStatus::Reconnecting);
                info!("Reconnecting in {:?} (attempt {})", delay, attempt);
                self.publish(LinkEvent::Reconnecting { attempt, delay });
            }
            None => {
                let attempts = self.state.reconnect_attempts;
                warn!("Reconnection strategy exhausted after {} attempts", attempts);
                self.report(LinkError::MaxReconnectAttemptsReached { attempts });
                self.settle_disconnected("max reconnect attempts reached");
            }
        }
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    async fn on_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::ConnectTimeout => {
                if self.pending_connect.take().is_some() {
                    let timeout = self.config.connection_timeout;
                    error!("Handshake did not complete within {:?}", timeout);
                    self.on_attempt_failed(LinkError::ConnectionTimeout(timeout));
                }
            }
            TimerKind::Reconnect => {
                self.view.stats.record_reconnect();
                match self.credential().await {
                    Some(token) => self.start_attempt(token),
                    None => {
                        warn!("No credential available for reconnect attempt");
                        self.on_attempt_failed(LinkError::MissingCredential);
                    }
                }
            }
            TimerKind::Ping => {
                let ping = self.keepalive.on_ping_due(&mut self.timers, Instant::now());
                if let Some(ping) = ping {
                    debug!("Sending keepalive ping");
                    // A ping that cannot even be written is never answered
                    if self.write(ping).await == Written::Stalled {
                        self.on_pong_timeout().await;
                    }
                }
            }
            TimerKind::PongTimeout => self.on_pong_timeout().await,
        }
    }

    async fn on_pong_timeout(&mut self) {
        let err = self.keepalive.on_pong_timeout(&mut self.timers);
        error!("{}", err);
        self.report(err);
        self.force_close("pong timeout").await;
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    async fn on_frame(&mut self, frame: WsMessage) {
        self.view.stats.record_received(frame.len());
        self.state.last_activity = Some(Utc::now());

        let text = match frame {
            WsMessage::Text(text) => text,
            WsMessage::Binary(data) => {
                warn!("Dropping {}-byte binary frame", data.len());
                self.report(LinkError::InvalidMessage(
                    "binary frames are not supported".to_string(),
                ));
                return;
            }
        };

        let message = match Message::decode(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping malformed message: {}", e);
                self.report(e);
                return;
            }
        };

        if message.kind() == MessageType::Pong {
            if let Some(latency) = self.keepalive.on_pong(&mut self.timers, Instant::now()) {
                debug!("Pong after {:?}", latency);
                self.view.stats.record_latency(latency);
                self.state.latency = Some(latency);
            }
        }

        self.publish(LinkEvent::Message(message.clone()));
        self.dispatch(&message);
    }

    /// Typed fan-out after the generic `message` topic
    fn dispatch(&mut self, message: &Message) {
        let event = match message.kind() {
            MessageType::ProgressUpdate => message
                .payload_as::<ProgressUpdate>()
                .and_then(|progress| progress.validate().map(|_| progress))
                .map(LinkEvent::ProgressUpdate),
            MessageType::TaskAssigned => message
                .payload_as::<TaskAssigned>()
                .map(LinkEvent::TaskAssigned),
            MessageType::Notification => message
                .payload_as::<Notification>()
                .map(LinkEvent::Notification),
            MessageType::Error => {
                let text = message
                    .payload_as::<ServerError>()
                    .map(|e| e.message)
                    .unwrap_or_else(|_| message.payload().to_string());
                warn!("Server reported error: {}", text);
                Ok(LinkEvent::Error(LinkError::Server(text)))
            }
            _ => return,
        };

        match event {
            Ok(LinkEvent::Error(err)) => self.report(err),
            Ok(event) => self.publish(event),
            Err(e) => {
                warn!("Dropping {} message: {}", message.kind().as_str(), e);
                self.report(e);
            }
        }
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    /// Write one message; failures are reported and the message is dropped
    ///
    /// Bounded by `pong_timeout` so a peer that stops reading cannot hold
    /// the manager away from its timers and commands.
    async fn write(&mut self, message: Message) -> Written {
        let Some(transport) = self.transport.as_mut() else {
            return Written::Failed;
        };
        let limit = self.config.pong_timeout;

        let (outcome, result) = match message.encode() {
            Ok(text) => {
                let bytes = text.len();
                let send = transport.send(WsMessage::Text(text));
                match tokio::time::timeout(limit, send).await {
                    Ok(Ok(())) => (Written::Sent, Ok(bytes)),
                    Ok(Err(e)) => (Written::Failed, Err(e.to_string())),
                    Err(_) => (
                        Written::Stalled,
                        Err(format!("write did not complete within {:?}", limit)),
                    ),
                }
            }
            Err(e) => (Written::Failed, Err(e.to_string())),
        };

        match result {
            Ok(bytes) => {
                self.view.stats.record_sent(bytes);
                self.state.last_activity = Some(Utc::now());
            }
            Err(reason) => {
                let err = LinkError::MessageSendFailed {
                    message_id: message.message_id().to_string(),
                    reason,
                };
                warn!("{}", err);
                self.view.stats.record_dropped();
                self.report(err);
            }
        }

        outcome
    }

    async fn flush_queue(&mut self) {
        let pending = self.queue.drain();
        if pending.is_empty() {
            return;
        }

        info!("Flushing {} queued messages", pending.len());
        let mut pending = pending.into_iter();
        let mut stalled = false;
        for message in pending.by_ref() {
            if self.write(message).await == Written::Stalled {
                stalled = true;
                break;
            }
        }

        if stalled {
            // Unsent messages wait for the next connection
            for message in pending {
                self.queue.push(message);
            }
            self.force_close("write stalled").await;
        }
    }

    // ------------------------------------------------------------------
    // Teardown paths
    // ------------------------------------------------------------------

    /// The open transport went away (peer close or forced close)
    fn on_closed(&mut self, reason: &str) {
        self.keepalive.stop(&mut self.timers);
        self.view.stats.mark_disconnected();
        self.state.connected_at = None;
        self.settle_disconnected(reason);

        if self.auto_reconnect {
            self.schedule_reconnect();
        }
    }

    /// Stop everything in flight and end up disconnected
    async fn halt(&mut self, reason: &str) {
        self.timers.cancel(TimerKind::Reconnect);
        self.timers.cancel(TimerKind::ConnectTimeout);
        self.keepalive.stop(&mut self.timers);

        if self.pending_connect.take().is_some() {
            debug!("Abandoning handshake in flight");
        }

        if self.transport.is_some() {
            self.transition(ConnectionStatus::Disconnecting);
            self.drop_transport().await;
        }

        self.view.stats.mark_disconnected();
        self.state.connected_at = None;
        self.settle_disconnected(reason);
    }

    async fn teardown(&mut self) {
        info!("Destroying connection manager");
        self.auto_reconnect = false;
        self.halt("destroyed").await;
        self.timers.clear();
        self.queue.clear();
        self.fail_waiters(LinkError::Destroyed);
        self.view.bus.clear();
    }

    /// Close and release the transport; the close handshake gets `pong_timeout`
    async fn drop_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if tokio::time::timeout(self.config.pong_timeout, transport.close())
                .await
                .is_err()
            {
                warn!("Close handshake timed out, dropping the transport");
            }
        }
    }

    /// Drop the open transport and take the close path
    async fn force_close(&mut self, reason: &str) {
        self.drop_transport().await;
        self.on_closed(reason);
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Explicit credential first, then the auth provider
    async fn credential(&mut self) -> Option<String> {
        resolve_credential(
            self.config.credential.clone(),
            self.auth.clone(),
            self.config.connection_timeout,
        )
        .await
    }

    /// Move along a state machine edge; same-status moves are ignored
    fn transition(&mut self, next: ConnectionStatus) -> bool {
        let current = self.state.status;
        if current == next {
            return false;
        }

        if !current.can_transition_to(next) {
            error!("Rejected state transition {} -> {}", current, next);
            return false;
        }

        debug!("State {} -> {}", current, next);
        self.state.status = next;
        true
    }

    fn settle_disconnected(&mut self, reason: &str) {
        if self.transition(ConnectionStatus::Disconnected) {
            info!("Disconnected: {}", reason);
            self.publish(LinkEvent::Disconnected {
                reason: reason.to_string(),
            });
        }
    }

    fn fail_waiters(&mut self, err: LinkError) {
        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(Err(err.clone()));
        }
    }

    /// Record and publish an error; never changes state
    fn report(&mut self, err: LinkError) {
        self.state.last_error = Some(err.clone());
        self.publish(LinkEvent::Error(err));
    }

    fn publish(&self, event: LinkEvent) {
        self.sync_view();
        self.view.bus.publish(&event);
    }

    fn sync_view(&self) {
        *self.view.state.write() = self.state.clone();
        self.view
            .pending_timers
            .store(self.timers.len(), Ordering::Release);
    }
}

async fn resolve_credential(
    credential: Option<String>,
    auth: Option<Arc<dyn AuthProvider>>,
    limit: Duration,
) -> Option<String> {
    if let Some(token) = credential.filter(|t| !t.is_empty()) {
        return Some(token);
    }

    let auth = auth?;
    match tokio::time::timeout(limit, auth.current_token()).await {
        Ok(token) => token.filter(|t| !t.is_empty()),
        Err(_) => {
            warn!("Auth provider did not answer within {:?}", limit);
            None
        }
    }
}

async fn handshake(pending: &mut Option<PendingConnect>) -> Result<Box<dyn Transport>> {
    match pending.as_mut() {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_frame(transport: &mut Option<Box<dyn Transport>>) -> Option<Result<WsMessage>> {
    match transport.as_mut() {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
