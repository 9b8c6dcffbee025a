//! Scheduled tasks for the connection manager
//!
//! All time-driven behaviour (handshake timeout, reconnect delay, ping
//! cadence, pong timeout) is a deadline in one table. The manager's event loop
//! sleeps until the earliest deadline and then pops expired entries one at a
//! time, so a handler that cancels another timer takes effect before that
//! timer is looked at.
//!
//! Deadlines use `tokio::time::Instant`, which follows the paused test clock.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Kinds of timer; at most one of each is pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    ConnectTimeout,
    Reconnect,
    Ping,
    PongTimeout,
}

#[derive(Debug, Default)]
pub struct Timers {
    pending: HashMap<TimerKind, Instant>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `kind` to fire `after` from now, replacing any pending deadline
    pub fn arm(&mut self, kind: TimerKind, after: Duration) {
        self.arm_at(kind, Instant::now() + after);
    }

    pub fn arm_at(&mut self, kind: TimerKind, deadline: Instant) {
        self.pending.insert(kind, deadline);
    }

    /// Cancel `kind`; returns whether it was pending
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.pending.remove(&kind).is_some()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.pending.contains_key(&kind)
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.pending.get(&kind).copied()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Remove and return the earliest timer whose deadline is at or before `now`
    pub fn pop_expired(&mut self, now: Instant) -> Option<TimerKind> {
        let (kind, _) = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .min_by_key(|(_, deadline)| **deadline)?;
        let kind = *kind;
        self.pending.remove(&kind);
        Some(kind)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
