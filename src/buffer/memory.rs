//! In-memory segment store
//!
//! Segments are grouped per stream. The outer map is only write-locked when a
//! stream is first seen or purged; every other operation takes the outer read
//! lock and then the stream's own mutex, so unrelated streams never contend.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use super::error::BufferError;
use super::segment::{Segment, StreamId};
use super::store::SegmentStore;

/// Segments of a single stream ordered by sequence number
type StreamSegments = Arc<Mutex<BTreeMap<u64, Segment>>>;

/// In-memory [`SegmentStore`]
#[derive(Default)]
pub struct MemoryStore {
    streams: RwLock<HashMap<StreamId, StreamSegments>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of segments across all streams
    pub async fn total_len(&self) -> usize {
        let streams = self.streams.read().await;
        let mut total = 0;
        for segments in streams.values() {
            total += segments.lock().await.len();
        }
        total
    }

    async fn segments(&self, stream: &StreamId) -> Option<StreamSegments> {
        self.streams.read().await.get(stream).cloned()
    }

    async fn segments_or_insert(&self, stream: &StreamId) -> StreamSegments {
        if let Some(segments) = self.segments(stream).await {
            return segments;
        }

        let mut streams = self.streams.write().await;
        Arc::clone(streams.entry(stream.clone()).or_default())
    }
}

impl SegmentStore for MemoryStore {
    async fn put(&self, segment: Segment) -> Result<(), BufferError> {
        let segments = self.segments_or_insert(&segment.stream_id).await;
        let mut segments = segments.lock().await;

        if segments.contains_key(&segment.sequence) {
            return Err(BufferError::DuplicateSequence {
                stream: segment.stream_id.clone(),
                sequence: segment.sequence,
            });
        }

        segments.insert(segment.sequence, segment);
        Ok(())
    }

    async fn peek_oldest_at_or_before(&self, stream: &StreamId, cutoff: Instant) -> Option<Segment> {
        let segments = self.segments(stream).await?;
        let segments = segments.lock().await;

        segments
            .values()
            .find(|segment| segment.arrival <= cutoff)
            .cloned()
    }

    async fn remove(&self, stream: &StreamId, sequence: u64) {
        if let Some(segments) = self.segments(stream).await {
            segments.lock().await.remove(&sequence);
        }
    }

    async fn purge_older_than(&self, stream: &StreamId, max_age: Duration) -> usize {
        let Some(cutoff) = Instant::now().checked_sub(max_age) else {
            return 0;
        };
        let Some(segments) = self.segments(stream).await else {
            return 0;
        };

        let mut segments = segments.lock().await;
        let before = segments.len();
        segments.retain(|_, segment| segment.arrival > cutoff);
        before - segments.len()
    }

    async fn purge_stream(&self, stream: &StreamId) -> usize {
        let removed = self.streams.write().await.remove(stream);

        match removed {
            Some(segments) => segments.lock().await.len(),
            None => 0,
        }
    }

    async fn len(&self, stream: &StreamId) -> usize {
        match self.segments(stream).await {
            Some(segments) => segments.lock().await.len(),
            None => 0,
        }
    }
}
