use super::message::Message;
use std::collections::VecDeque;

/// FIFO buffer for messages sent while the link is down
///
/// Holds at most `capacity` messages (0 = unbounded). When full, the oldest
/// message is evicted and handed back to the caller so it can be accounted
/// for. Nothing is persisted.
#[derive(Debug)]
pub struct OutboundQueue {
    items: VecDeque<Message>,
    capacity: usize,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    /// Append a message; returns the evicted message on overflow
    pub fn push(&mut self, message: Message) -> Option<Message> {
        let evicted = if self.capacity > 0 && self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(message);
        evicted
    }

    /// Take every message in enqueue order, leaving the queue empty
    pub fn drain(&mut self) -> Vec<Message> {
        self.items.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
