//! Typed publish/subscribe surface for link events
//!
//! Subscribers register per topic and are called synchronously on the
//! connection manager's task, in subscription order. Callbacks must not block;
//! consumers on other threads should use [`EventBus::subscribe_channel`].

use super::message::{Message, Notification, ProgressUpdate, TaskAssigned};
use crate::traits::LinkError;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Event topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Connected,
    Disconnected,
    Reconnecting,
    /// Every inbound message, before typed dispatch
    Message,
    Error,
    ProgressUpdate,
    TaskAssigned,
    Notification,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::Connected,
        Topic::Disconnected,
        Topic::Reconnecting,
        Topic::Message,
        Topic::Error,
        Topic::ProgressUpdate,
        Topic::TaskAssigned,
        Topic::Notification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Connected => "connected",
            Topic::Disconnected => "disconnected",
            Topic::Reconnecting => "reconnecting",
            Topic::Message => "message",
            Topic::Error => "error",
            Topic::ProgressUpdate => "progress_update",
            Topic::TaskAssigned => "task_assigned",
            Topic::Notification => "notification",
        }
    }
}

/// Events published by the connection manager
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Connected,
    Disconnected { reason: String },
    /// Attempt number (1-indexed) and the delay before it runs
    Reconnecting { attempt: u32, delay: Duration },
    Message(Message),
    Error(LinkError),
    ProgressUpdate(ProgressUpdate),
    TaskAssigned(TaskAssigned),
    Notification(Notification),
}

impl LinkEvent {
    pub fn topic(&self) -> Topic {
        match self {
            LinkEvent::Connected => Topic::Connected,
            LinkEvent::Disconnected { .. } => Topic::Disconnected,
            LinkEvent::Reconnecting { .. } => Topic::Reconnecting,
            LinkEvent::Message(_) => Topic::Message,
            LinkEvent::Error(_) => Topic::Error,
            LinkEvent::ProgressUpdate(_) => Topic::ProgressUpdate,
            LinkEvent::TaskAssigned(_) => Topic::TaskAssigned,
            LinkEvent::Notification(_) => Topic::Notification,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&LinkEvent) + Send + Sync>;

#[derive(Clone)]
enum Sink {
    Callback(Callback),
    /// Pruned on the first publish after its receiver is dropped
    Channel(Sender<LinkEvent>),
}

/// Registry of subscriber lists keyed by topic
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<Topic, Vec<(SubscriptionId, Sink)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, topic: Topic, callback: F) -> SubscriptionId
    where
        F: Fn(&LinkEvent) + Send + Sync + 'static,
    {
        self.register(topic, Sink::Callback(Arc::new(callback)))
    }

    fn register(&self, topic: Topic, sink: Sink) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .entry(topic)
            .or_default()
            .push((id, sink));
        id
    }

    /// Remove one subscription; returns whether it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        for list in subscribers.values_mut() {
            if let Some(pos) = list.iter().position(|(sub, _)| *sub == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Forward one topic into an unbounded channel
    ///
    /// The subscription lives until `unsubscribe`, `clear`, or the first
    /// publish on `topic` after the receiver is dropped.
    pub fn subscribe_channel(&self, topic: Topic) -> (SubscriptionId, Receiver<LinkEvent>) {
        let (tx, rx) = unbounded();
        (self.register(topic, Sink::Channel(tx)), rx)
    }

    /// Forward every topic into one channel, in publish order
    pub fn subscribe_all_channel(&self) -> (Vec<SubscriptionId>, Receiver<LinkEvent>) {
        let (tx, rx) = unbounded();
        let ids = Topic::ALL
            .iter()
            .map(|topic| self.register(*topic, Sink::Channel(tx.clone())))
            .collect();
        (ids, rx)
    }

    /// Deliver `event` to every subscriber of its topic
    pub fn publish(&self, event: &LinkEvent) {
        let topic = event.topic();
        // Snapshot so callbacks may subscribe or unsubscribe without deadlocking
        let sinks: Vec<(SubscriptionId, Sink)> = match self.subscribers.read().get(&topic) {
            Some(list) => list.clone(),
            None => return,
        };

        let mut closed = Vec::new();
        for (id, sink) in sinks {
            match sink {
                Sink::Callback(callback) => callback(event),
                Sink::Channel(tx) => {
                    if tx.send(event.clone()).is_err() {
                        closed.push(id);
                    }
                }
            }
        }

        if !closed.is_empty() {
            if let Some(list) = self.subscribers.write().get_mut(&topic) {
                list.retain(|(id, _)| !closed.contains(id));
            }
            debug!("Pruned {} closed {} channels", closed.len(), topic.as_str());
        }
    }

    /// Detach every subscriber
    pub fn clear(&self) {
        let mut subscribers = self.subscribers.write();
        let count: usize = subscribers.values().map(Vec::len).sum();
        subscribers.clear();
        debug!("Detached {} subscribers", count);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().values().map(Vec::len).sum()
    }

    pub fn topic_subscriber_count(&self, topic: Topic) -> usize {
        self.subscribers.read().get(&topic).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_delivery_in_subscription_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let log = Arc::clone(&log);
            bus.subscribe(Topic::Connected, move |_| log.lock().push(n));
        }

        bus.publish(&LinkEvent::Connected);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_topics_are_isolated() {
        let bus = EventBus::new();
        let (_, connected) = bus.subscribe_channel(Topic::Connected);

        bus.publish(&LinkEvent::Disconnected {
            reason: "closed".into(),
        });

        assert!(connected.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let (id, rx) = bus.subscribe_channel(Topic::Error);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));

        bus.publish(&LinkEvent::Error(LinkError::MissingCredential));
        assert!(rx.try_recv().is_err());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribe_all_channel() {
        let bus = EventBus::new();
        let (ids, rx) = bus.subscribe_all_channel();
        assert_eq!(ids.len(), Topic::ALL.len());

        bus.publish(&LinkEvent::Connected);
        bus.publish(&LinkEvent::Reconnecting {
            attempt: 1,
            delay: Duration::from_secs(1),
        });

        assert_eq!(rx.try_recv().unwrap(), LinkEvent::Connected);
        assert_eq!(rx.try_recv().unwrap().topic(), Topic::Reconnecting);
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let bus = Arc::new(EventBus::new());
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let id = {
            let bus = Arc::clone(&bus);
            let slot = Arc::clone(&slot);
            bus.clone().subscribe(Topic::Connected, move |_| {
                if let Some(id) = *slot.lock() {
                    bus.unsubscribe(id);
                }
            })
        };
        *slot.lock() = Some(id);

        bus.publish(&LinkEvent::Connected);
        assert_eq!(bus.topic_subscriber_count(Topic::Connected), 0);
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let bus = EventBus::new();
        let receivers: Vec<_> = (0..100)
            .map(|_| bus.subscribe_channel(Topic::Connected).1)
            .collect();
        let (_, kept) = bus.subscribe_channel(Topic::Connected);
        assert_eq!(bus.topic_subscriber_count(Topic::Connected), 101);

        drop(receivers);
        bus.publish(&LinkEvent::Connected);

        assert_eq!(bus.topic_subscriber_count(Topic::Connected), 1);
        assert_eq!(kept.try_recv().unwrap(), LinkEvent::Connected);
    }

    #[test]
    fn test_dropped_all_channel_is_pruned_per_topic() {
        let bus = EventBus::new();
        let (_, rx) = bus.subscribe_all_channel();
        drop(rx);

        bus.publish(&LinkEvent::Connected);
        assert_eq!(bus.topic_subscriber_count(Topic::Connected), 0);
        assert_eq!(bus.subscriber_count(), Topic::ALL.len() - 1);
    }

    #[test]
    fn test_clear() {
        let bus = EventBus::new();
        bus.subscribe(Topic::Message, |_| {});
        bus.subscribe(Topic::Notification, |_| {});
        assert_eq!(bus.subscriber_count(), 2);

        bus.clear();
        assert_eq!(bus.subscriber_count(), 0);
    }
}
