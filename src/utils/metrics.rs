//! Bridge Metrics
//!
//! Atomic counters for monitoring frame flow and link health. One
//! [`Metrics`] instance is shared (behind an `Arc`) by a bridge, its
//! pipeline and its transport tasks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Counters for one bridge instance
#[derive(Debug)]
pub struct Metrics {
    /// Frames handed to the transport
    pub frames_sent: AtomicU64,
    /// Frames decoded from the transport
    pub frames_received: AtomicU64,
    /// Total bytes written
    pub bytes_sent: AtomicU64,
    /// Total bytes read
    pub bytes_received: AtomicU64,
    /// Frames rejected by validation
    pub corrupt_frames: AtomicU64,
    /// Existing/removed records naming an untracked participant
    pub unmatched_records: AtomicU64,
    /// Connections established
    pub connections_total: AtomicU64,
    /// Reconnect cycles started after a failure
    pub reconnects: AtomicU64,
    /// Relay sets recomputed by the throttled scheduler
    pub relay_recomputations: AtomicU64,
    /// Ticks that produced no write (transport busy or down, or tick error)
    pub dropped_ticks: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            corrupt_frames: AtomicU64::new(0),
            unmatched_records: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            relay_recomputations: AtomicU64::new(0),
            dropped_ticks: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn frame_sent(&self, byte_count: u64) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn frame_received(&self, byte_count: u64) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn corrupt_frame(&self) {
        self.corrupt_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unmatched_record(&self) {
        self.unmatched_records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn relay_recomputed(&self, count: u64) {
        self.relay_recomputations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn tick_dropped(&self) {
        self.dropped_ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            corrupt_frames: self.corrupt_frames.load(Ordering::Relaxed),
            unmatched_records: self.unmatched_records.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            relay_recomputations: self.relay_recomputations.load(Ordering::Relaxed),
            dropped_ticks: self.dropped_ticks.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            frames_sent = snapshot.frames_sent,
            frames_received = snapshot.frames_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            corrupt_frames = snapshot.corrupt_frames,
            unmatched_records = snapshot.unmatched_records,
            connections_total = snapshot.connections_total,
            reconnects = snapshot.reconnects,
            relay_recomputations = snapshot.relay_recomputations,
            dropped_ticks = snapshot.dropped_ticks,
            uptime_seconds = snapshot.uptime_seconds,
            "Bridge metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub corrupt_frames: u64,
    pub unmatched_records: u64,
    pub connections_total: u64,
    pub reconnects: u64,
    pub relay_recomputations: u64,
    pub dropped_ticks: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}
