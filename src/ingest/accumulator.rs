//! Duration-based segment accumulation
//!
//! Incoming bytes are appended to a buffer until the wall-clock time since
//! the first byte of the current segment reaches the target duration. The
//! split ignores transport-stream structure, so a segment may begin
//! mid-frame.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::time::Instant;

/// A completed segment payload and the span it covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flushed {
    pub payload: Bytes,
    pub duration: Duration,
}

/// Accumulates received bytes into fixed-duration segments
#[derive(Debug)]
pub struct SegmentAccumulator {
    target: Duration,
    started_at: Option<Instant>,
    buffer: BytesMut,
}

impl SegmentAccumulator {
    /// Create an accumulator that flushes every `target`
    pub fn new(target: Duration) -> Self {
        Self::with_capacity(target, 64 * 1024)
    }

    /// Create an accumulator with an initial buffer capacity
    pub fn with_capacity(target: Duration, capacity: usize) -> Self {
        Self {
            target,
            started_at: None,
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Append received bytes
    ///
    /// Returns the completed segment if the current one reached the target
    /// duration at `now`. The flushed segment includes `data`.
    pub fn push(&mut self, data: &[u8], now: Instant) -> Option<Flushed> {
        if data.is_empty() {
            return None;
        }

        let started_at = *self.started_at.get_or_insert(now);
        self.buffer.extend_from_slice(data);

        let elapsed = now.saturating_duration_since(started_at);
        if elapsed < self.target {
            return None;
        }

        self.started_at = None;
        Some(Flushed {
            payload: self.buffer.split().freeze(),
            duration: elapsed,
        })
    }

    /// Bytes buffered for the segment in progress
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop the segment in progress
    pub fn discard(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        self.started_at = None;
        dropped
    }
}
