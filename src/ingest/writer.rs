//! Sequenced writes into the segment buffer

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::buffer::{BufferError, Segment, SegmentStore};
use crate::pipeline::PipelineContext;

/// Numbers captured segments and puts them into the buffer
///
/// Owned by a single capture loop, which makes `put` order match sequence
/// order for the stream.
pub struct SegmentWriter<S> {
    store: Arc<S>,
    ctx: PipelineContext,
    next_sequence: u64,
}

impl<S: SegmentStore> SegmentWriter<S> {
    /// Create a writer starting at sequence 0
    pub fn new(store: Arc<S>, ctx: PipelineContext) -> Self {
        Self {
            store,
            ctx,
            next_sequence: 0,
        }
    }

    /// Stamp `payload` with the current instant and buffer it
    ///
    /// Returns the sequence number assigned to the segment.
    pub async fn write(&mut self, payload: Bytes, duration: Duration) -> Result<u64, BufferError> {
        let sequence = self.next_sequence;
        let size = payload.len();
        let segment = Segment::new(self.ctx.stream_id.clone(), sequence, duration, payload);

        self.store.put(segment).await?;
        self.next_sequence += 1;
        self.ctx.counters.record_captured(size);

        tracing::debug!(
            stream = %self.ctx.stream_id,
            sequence = sequence,
            bytes = size,
            duration_ms = duration.as_millis() as u64,
            "Segment captured"
        );

        Ok(sequence)
    }

    /// Sequence number the next segment will get
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Context of the stream being captured
    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }
}
