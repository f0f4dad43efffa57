//! Process-wide relay statistics
//!
//! Cumulative byte counters updated by every completed relay session.
//! Owned by the process and injected into sessions as an `Arc`, so there
//! is no hidden global state while every session still contributes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically increasing byte counters for the process lifetime.
///
/// No reset operation; 64-bit wraparound is left to arithmetic.
#[derive(Debug, Default)]
pub struct RelayStats {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl RelayStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one session's byte counts
    pub fn record(&self, sent: u64, received: u64) {
        self.bytes_sent.fetch_add(sent, Ordering::Relaxed);
        self.bytes_received.fetch_add(received, Ordering::Relaxed);
    }

    /// Total bytes sent into the tunnel
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Total bytes received from the tunnel
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }
}
