use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Weight of the previous average in the latency EWMA
const LATENCY_DECAY: f64 = 0.8;

/// Stats snapshot, a copy detached from the collector
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub reconnect_count: u64,
    /// Messages evicted from the outbound queue or lost on a failed write
    pub messages_dropped: u64,
    /// Smoothed keepalive round trip in milliseconds, `None` before the first pong
    pub average_latency_ms: Option<f64>,
    /// Time since the current connection opened, zero while not connected
    pub uptime: Duration,
}

/// Shared counters for one connection manager
///
/// Written by the manager's task, read by any handle. Counters are lock-free
/// atomics; the latency average and connection start sit behind short locks.
#[derive(Debug, Default)]
pub struct StatsCollector {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    reconnect_count: AtomicU64,
    messages_dropped: AtomicU64,
    average_latency_ms: Mutex<Option<f64>>,
    connected_since: Mutex<Option<Instant>>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reconnect(&self) {
        self.reconnect_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold one round trip into the EWMA; the first sample seeds the average
    pub fn record_latency(&self, latency: Duration) {
        let sample = latency.as_nanos() as f64 / 1_000_000.0;
        let mut average = self.average_latency_ms.lock();
        *average = Some(match *average {
            None => sample,
            Some(prev) => prev * LATENCY_DECAY + sample * (1.0 - LATENCY_DECAY),
        });
    }

    pub fn mark_connected(&self) {
        *self.connected_since.lock() = Some(Instant::now());
    }

    pub fn mark_disconnected(&self) {
        *self.connected_since.lock() = None;
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Stats {
        let uptime = self
            .connected_since
            .lock()
            .map(|since| Instant::now().saturating_duration_since(since))
            .unwrap_or(Duration::ZERO);

        Stats {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            reconnect_count: self.reconnect_count.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            average_latency_ms: *self.average_latency_ms.lock(),
            uptime,
        }
    }
}
