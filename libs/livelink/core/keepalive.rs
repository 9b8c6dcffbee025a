//! Keepalive monitor
//!
//! # Architecture
//!
//! ```text
//! connected ──> start() arms Ping
//!
//! Ping fires ──> on_ping_due(): record send time, arm PongTimeout,
//!                re-arm Ping, hand a ping Message back to the manager
//!                (skipped while a pong is still owed; its deadline stands)
//!
//! pong frame ──> on_pong(): cancel PongTimeout, return round trip
//!
//! PongTimeout ──> on_pong_timeout(): PongTimeout error, manager force-closes
//!
//! leaving connected (any path) ──> stop() drops both timers
//! ```
//!
//! The monitor never touches the transport. It only returns messages for the
//! manager to write through its normal send path.

use super::message::Message;
use super::timers::{TimerKind, Timers};
use crate::traits::LinkError;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
pub struct KeepaliveMonitor {
    ping_interval: Duration,
    pong_timeout: Duration,
    /// Send time of the ping still waiting for its pong
    last_ping_at: Option<Instant>,
    active: bool,
}

impl KeepaliveMonitor {
    pub fn new(ping_interval: Duration, pong_timeout: Duration) -> Self {
        Self {
            ping_interval,
            pong_timeout,
            last_ping_at: None,
            active: false,
        }
    }

    /// Begin the ping cadence; the first ping goes out one interval from now
    pub fn start(&mut self, timers: &mut Timers) {
        self.active = true;
        self.last_ping_at = None;
        timers.cancel(TimerKind::PongTimeout);
        timers.arm(TimerKind::Ping, self.ping_interval);
        debug!("Keepalive started with interval: {:?}", self.ping_interval);
    }

    /// Tear down every keepalive timer
    pub fn stop(&mut self, timers: &mut Timers) {
        if self.active {
            debug!("Keepalive stopped");
        }
        self.active = false;
        self.last_ping_at = None;
        timers.cancel(TimerKind::Ping);
        timers.cancel(TimerKind::PongTimeout);
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn awaiting_pong(&self) -> bool {
        self.last_ping_at.is_some()
    }

    /// The Ping timer fired: returns the ping to write
    ///
    /// While an earlier ping is unanswered nothing is sent and its
    /// PongTimeout deadline is left where it is.
    pub fn on_ping_due(&mut self, timers: &mut Timers, now: Instant) -> Option<Message> {
        if !self.active {
            return None;
        }

        timers.arm_at(TimerKind::Ping, now + self.ping_interval);
        if self.awaiting_pong() {
            debug!("Previous ping still unanswered, skipping this one");
            return None;
        }

        self.last_ping_at = Some(now);
        timers.arm_at(TimerKind::PongTimeout, now + self.pong_timeout);
        Some(Message::ping())
    }

    /// A pong arrived: returns the round trip, or `None` if no ping was outstanding
    pub fn on_pong(&mut self, timers: &mut Timers, now: Instant) -> Option<Duration> {
        let sent_at = self.last_ping_at.take()?;
        timers.cancel(TimerKind::PongTimeout);
        Some(now.saturating_duration_since(sent_at))
    }

    /// The PongTimeout timer fired
    ///
    /// Stops the monitor; the caller is expected to force-close the transport.
    pub fn on_pong_timeout(&mut self, timers: &mut Timers) -> LinkError {
        self.stop(timers);
        LinkError::PongTimeout(self.pong_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::MessageType;

    fn monitor() -> KeepaliveMonitor {
        KeepaliveMonitor::new(Duration::from_secs(30), Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_arms_ping_only() {
        let mut timers = Timers::new();
        let mut keepalive = monitor();
        keepalive.start(&mut timers);

        assert!(timers.is_armed(TimerKind::Ping));
        assert!(!timers.is_armed(TimerKind::PongTimeout));
        assert_eq!(
            timers.deadline(TimerKind::Ping),
            Some(Instant::now() + Duration::from_secs(30))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_arms_pong_timeout() {
        let mut timers = Timers::new();
        let mut keepalive = monitor();
        keepalive.start(&mut timers);

        let now = Instant::now() + Duration::from_secs(30);
        let ping = keepalive.on_ping_due(&mut timers, now).unwrap();

        assert_eq!(ping.kind(), MessageType::Ping);
        assert!(keepalive.awaiting_pong());
        assert_eq!(
            timers.deadline(TimerKind::PongTimeout),
            Some(now + Duration::from_secs(5))
        );
        assert_eq!(
            timers.deadline(TimerKind::Ping),
            Some(now + Duration::from_secs(30))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_measures_round_trip() {
        let mut timers = Timers::new();
        let mut keepalive = monitor();
        keepalive.start(&mut timers);

        let sent = Instant::now();
        keepalive.on_ping_due(&mut timers, sent);
        let latency = keepalive
            .on_pong(&mut timers, sent + Duration::from_millis(120))
            .unwrap();

        assert_eq!(latency, Duration::from_millis(120));
        assert!(!timers.is_armed(TimerKind::PongTimeout));
        assert!(!keepalive.awaiting_pong());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsolicited_pong_ignored() {
        let mut timers = Timers::new();
        let mut keepalive = monitor();
        keepalive.start(&mut timers);

        assert!(keepalive.on_pong(&mut timers, Instant::now()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_stops_monitor() {
        let mut timers = Timers::new();
        let mut keepalive = monitor();
        keepalive.start(&mut timers);
        keepalive.on_ping_due(&mut timers, Instant::now());

        let err = keepalive.on_pong_timeout(&mut timers);

        assert_eq!(err, LinkError::PongTimeout(Duration::from_secs(5)));
        assert!(timers.is_empty());
        assert!(!keepalive.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_outstanding_ping_keeps_its_deadline() {
        let mut timers = Timers::new();
        let mut keepalive =
            KeepaliveMonitor::new(Duration::from_secs(10), Duration::from_secs(15));
        keepalive.start(&mut timers);

        let first = Instant::now() + Duration::from_secs(10);
        assert!(keepalive.on_ping_due(&mut timers, first).is_some());

        let second = first + Duration::from_secs(10);
        assert!(keepalive.on_ping_due(&mut timers, second).is_none());

        assert_eq!(
            timers.deadline(TimerKind::PongTimeout),
            Some(first + Duration::from_secs(15))
        );
        assert_eq!(
            timers.deadline(TimerKind::Ping),
            Some(second + Duration::from_secs(10))
        );

        // Round trip is measured from the ping that actually went out
        let latency = keepalive
            .on_pong(&mut timers, second + Duration::from_secs(1))
            .unwrap();
        assert_eq!(latency, Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ping_when_stopped() {
        let mut timers = Timers::new();
        let mut keepalive = monitor();

        assert!(keepalive.on_ping_due(&mut timers, Instant::now()).is_none());
        assert!(timers.is_empty());
    }
}
