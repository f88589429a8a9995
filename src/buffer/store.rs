//! Storage backend interface for the segment buffer
//!
//! Any backend (in-memory, embedded database, networked store) can sit behind
//! the relay as long as it implements [`SegmentStore`]. All methods must be
//! safe to call concurrently from the capture loop (writer), the delay gate
//! (reader and deleter) and the retention sweeper (deleter) of the same
//! stream.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use super::error::BufferError;
use super::segment::{Segment, StreamId};

/// Time-indexed segment storage keyed by (stream, sequence)
pub trait SegmentStore: Send + Sync + 'static {
    /// Insert a new segment
    ///
    /// Fails with [`BufferError::DuplicateSequence`] if the pair is taken.
    fn put(&self, segment: Segment) -> impl Future<Output = Result<(), BufferError>> + Send;

    /// Lowest-sequence segment of `stream` with `arrival <= cutoff`
    ///
    /// The segment stays buffered; callers release it with [`remove`](Self::remove).
    fn peek_oldest_at_or_before(
        &self,
        stream: &StreamId,
        cutoff: Instant,
    ) -> impl Future<Output = Option<Segment>> + Send;

    /// Delete a segment. Removing an absent segment is a no-op.
    fn remove(&self, stream: &StreamId, sequence: u64) -> impl Future<Output = ()> + Send;

    /// Delete every segment of `stream` that has been buffered for at least `max_age`
    ///
    /// Returns the number of segments removed.
    fn purge_older_than(
        &self,
        stream: &StreamId,
        max_age: Duration,
    ) -> impl Future<Output = usize> + Send;

    /// Delete all segments of `stream`, returning how many were removed
    fn purge_stream(&self, stream: &StreamId) -> impl Future<Output = usize> + Send;

    /// Number of segments currently buffered for `stream`
    fn len(&self, stream: &StreamId) -> impl Future<Output = usize> + Send;
}
