//! Statistics for relayed streams

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters for one stream
///
/// Updated from the capture, gate and sweeper tasks without locking.
#[derive(Debug)]
pub struct StreamCounters {
    started_at: Instant,
    segments_captured: AtomicU64,
    bytes_captured: AtomicU64,
    segments_released: AtomicU64,
    segments_swept: AtomicU64,
    sink_failures: AtomicU64,
}

impl StreamCounters {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            segments_captured: AtomicU64::new(0),
            bytes_captured: AtomicU64::new(0),
            segments_released: AtomicU64::new(0),
            segments_swept: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
        }
    }

    /// Record a segment written into the buffer
    pub fn record_captured(&self, bytes: usize) {
        self.segments_captured.fetch_add(1, Ordering::Relaxed);
        self.bytes_captured.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a segment handed to the sink
    pub fn record_released(&self) {
        self.segments_released.fetch_add(1, Ordering::Relaxed);
    }

    /// Record segments dropped by the retention sweeper
    pub fn record_swept(&self, count: usize) {
        self.segments_swept.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record a failed sink delivery
    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy
    pub fn snapshot(&self) -> StreamStats {
        StreamStats {
            uptime: self.started_at.elapsed(),
            segments_captured: self.segments_captured.load(Ordering::Relaxed),
            bytes_captured: self.bytes_captured.load(Ordering::Relaxed),
            segments_released: self.segments_released.load(Ordering::Relaxed),
            segments_swept: self.segments_swept.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for StreamCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of a stream's counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Time since the stream was started
    pub uptime: Duration,
    /// Segments written into the buffer
    pub segments_captured: u64,
    /// Payload bytes written into the buffer
    pub bytes_captured: u64,
    /// Segments released to the sink
    pub segments_released: u64,
    /// Segments dropped unreleased by the sweeper
    pub segments_swept: u64,
    /// Sink deliveries that failed
    pub sink_failures: u64,
}

impl StreamStats {
    /// Average capture bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            (self.bytes_captured * 8) / secs
        } else {
            0
        }
    }

    /// Segments captured but not yet released, skipped or swept
    pub fn backlog(&self) -> u64 {
        self.segments_captured
            .saturating_sub(self.segments_released)
            .saturating_sub(self.sink_failures)
            .saturating_sub(self.segments_swept)
    }
}
