//! Observability and Metrics
//!
//! Counters for sessions, frames and every terminal state a received message
//! can reach (dispatched or dropped, and why).
//!
//! Uses atomic counters for thread-safe metrics collection. One instance is
//! owned by the [`crate::context::NetContext`] and shared by reference.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Why a received message never reached a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UnknownTag,
    NoHandler,
    DecodeError,
    QueueFull,
}

/// Metrics collector for engine operations
#[derive(Debug)]
pub struct Metrics {
    /// Total sessions opened
    pub sessions_total: AtomicU64,
    /// Currently open sessions
    pub sessions_active: AtomicU64,
    /// Frames handed to the dispatch engine
    pub frames_received: AtomicU64,
    /// Total bytes received
    pub bytes_received: AtomicU64,
    /// Frames decoded and queued
    pub messages_decoded: AtomicU64,
    /// Handlers invoked
    pub messages_dispatched: AtomicU64,
    /// Dropped: tag not in the registry
    pub dropped_unknown_tag: AtomicU64,
    /// Dropped: no handler bound for the tag
    pub dropped_no_handler: AtomicU64,
    /// Dropped: malformed payload
    pub dropped_decode_error: AtomicU64,
    /// Dropped: dispatch queue at capacity
    pub dropped_queue_full: AtomicU64,
    /// Handlers that returned an error
    pub handler_errors: AtomicU64,
    /// Frames passed to a transport
    pub messages_sent: AtomicU64,
    /// Total bytes sent
    pub bytes_sent: AtomicU64,
    /// Sends rejected by a transport
    pub send_failures: AtomicU64,
    /// Connection-level failures
    pub transport_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            sessions_total: AtomicU64::new(0),
            sessions_active: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            messages_decoded: AtomicU64::new(0),
            messages_dispatched: AtomicU64::new(0),
            dropped_unknown_tag: AtomicU64::new(0),
            dropped_no_handler: AtomicU64::new(0),
            dropped_decode_error: AtomicU64::new(0),
            dropped_queue_full: AtomicU64::new(0),
            handler_errors: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a new session
    pub fn session_opened(&self) {
        self.sessions_total.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session closed
    pub fn session_closed(&self) {
        // Saturate instead of wrapping if a close is ever reported twice
        let _ = self
            .sessions_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Record a frame arriving at the dispatch engine
    pub fn frame_received(&self, byte_count: u64) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn message_decoded(&self) {
        self.messages_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_dispatched(&self) {
        self.messages_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message that reached a terminal drop state
    pub fn message_dropped(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::UnknownTag => &self.dropped_unknown_tag,
            DropReason::NoHandler => &self.dropped_no_handler,
            DropReason::DecodeError => &self.dropped_decode_error,
            DropReason::QueueFull => &self.dropped_queue_full,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message sent
    pub fn message_sent(&self, byte_count: u64) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn send_failed(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_total: self.sessions_total.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_decoded: self.messages_decoded.load(Ordering::Relaxed),
            messages_dispatched: self.messages_dispatched.load(Ordering::Relaxed),
            dropped_unknown_tag: self.dropped_unknown_tag.load(Ordering::Relaxed),
            dropped_no_handler: self.dropped_no_handler.load(Ordering::Relaxed),
            dropped_decode_error: self.dropped_decode_error.load(Ordering::Relaxed),
            dropped_queue_full: self.dropped_queue_full.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            sessions_total = snapshot.sessions_total,
            sessions_active = snapshot.sessions_active,
            frames_received = snapshot.frames_received,
            bytes_received = snapshot.bytes_received,
            messages_decoded = snapshot.messages_decoded,
            messages_dispatched = snapshot.messages_dispatched,
            dropped = snapshot.dropped_total(),
            handler_errors = snapshot.handler_errors,
            messages_sent = snapshot.messages_sent,
            bytes_sent = snapshot.bytes_sent,
            send_failures = snapshot.send_failures,
            transport_errors = snapshot.transport_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Dispatch metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sessions_total: u64,
    pub sessions_active: u64,
    pub frames_received: u64,
    pub bytes_received: u64,
    pub messages_decoded: u64,
    pub messages_dispatched: u64,
    pub dropped_unknown_tag: u64,
    pub dropped_no_handler: u64,
    pub dropped_decode_error: u64,
    pub dropped_queue_full: u64,
    pub handler_errors: u64,
    pub messages_sent: u64,
    pub bytes_sent: u64,
    pub send_failures: u64,
    pub transport_errors: u64,
    pub uptime_seconds: u64,
}

impl MetricsSnapshot {
    pub fn dropped_total(&self) -> u64 {
        self.dropped_unknown_tag
            + self.dropped_no_handler
            + self.dropped_decode_error
            + self.dropped_queue_full
    }
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
