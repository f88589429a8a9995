//! Segment and stream identifier types
//!
//! A segment is a chunk of transport-stream bytes captured over a fixed
//! wall-clock span. Segments are immutable once created; cloning one only
//! bumps the reference count on the payload.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

/// Unique identifier for a relayed stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(String);

impl StreamId {
    /// Create a new stream id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for StreamId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A captured chunk of a stream
#[derive(Debug, Clone)]
pub struct Segment {
    /// Stream this segment belongs to
    pub stream_id: StreamId,
    /// Per-stream sequence number, starting at 0
    pub sequence: u64,
    /// When the segment was completed by the capture loop
    pub arrival: Instant,
    /// Wall-clock span covered by the payload
    pub duration: Duration,
    /// Raw transport-stream bytes
    pub payload: Bytes,
}

impl Segment {
    /// Create a segment stamped with the current instant
    pub fn new(stream_id: StreamId, sequence: u64, duration: Duration, payload: Bytes) -> Self {
        Self::with_arrival(stream_id, sequence, Instant::now(), duration, payload)
    }

    /// Create a segment with an explicit arrival instant
    pub fn with_arrival(
        stream_id: StreamId,
        sequence: u64,
        arrival: Instant,
        duration: Duration,
        payload: Bytes,
    ) -> Self {
        Self {
            stream_id,
            sequence,
            arrival,
            duration,
            payload,
        }
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Time elapsed since arrival, measured at `now`
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.arrival)
    }
}
