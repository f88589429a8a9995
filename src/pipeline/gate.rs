//! Delay gate
//!
//! Releases each buffered segment exactly once, in sequence order, once it
//! has aged past the stream's delay. Release is retrieve-then-delete: the
//! segment is handed to the sink first and removed from the buffer after.
//!
//! The gate polls at a fixed interval when nothing is eligible rather than
//! waiting on a notification from the capture loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::context::PipelineContext;
use crate::buffer::SegmentStore;
use crate::egress::{SegmentSink, SinkError};

/// Default wait between polls when no segment is eligible
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Per-stream release loop
pub struct DelayGate<S, K> {
    store: Arc<S>,
    sink: K,
    delay: Duration,
    poll_interval: Duration,
    ctx: PipelineContext,
}

impl<S: SegmentStore, K: SegmentSink> DelayGate<S, K> {
    pub fn new(
        store: Arc<S>,
        sink: K,
        delay: Duration,
        poll_interval: Duration,
        ctx: PipelineContext,
    ) -> Self {
        Self {
            store,
            sink,
            delay,
            poll_interval,
            ctx,
        }
    }

    /// Open the sink and release segments until cancelled
    ///
    /// Returns an error only for fatal sink failures.
    pub async fn run(mut self) -> Result<(), SinkError> {
        self.sink.open().await?;

        tracing::info!(
            stream = %self.ctx.stream_id,
            delay_ms = self.delay.as_millis() as u64,
            "Delay gate started"
        );

        while !self.ctx.is_cancelled() {
            if self.release_next().await? {
                continue;
            }

            tokio::select! {
                _ = self.ctx.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        tracing::debug!(stream = %self.ctx.stream_id, "Delay gate stopped");
        Ok(())
    }

    /// Release the oldest eligible segment, if any
    ///
    /// Returns true if a segment left the buffer. A transient sink failure
    /// still removes the segment so the stream keeps moving.
    pub async fn release_next(&mut self) -> Result<bool, SinkError> {
        let stream_id = &self.ctx.stream_id;
        let Some(cutoff) = Instant::now().checked_sub(self.delay) else {
            return Ok(false);
        };
        let Some(segment) = self.store.peek_oldest_at_or_before(stream_id, cutoff).await else {
            return Ok(false);
        };

        match self.sink.deliver(&segment).await {
            Ok(()) => {
                self.ctx.counters.record_released();
                tracing::debug!(
                    stream = %stream_id,
                    sequence = segment.sequence,
                    bytes = segment.size(),
                    "Segment released"
                );
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                self.ctx.counters.record_sink_failure();
                tracing::warn!(
                    stream = %stream_id,
                    sequence = segment.sequence,
                    error = %e,
                    "Segment delivery failed, skipping"
                );
            }
        }

        self.store.remove(stream_id, segment.sequence).await;
        Ok(true)
    }

    /// The sink this gate delivers to
    pub fn sink(&self) -> &K {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio::sync::mpsc;

    use super::*;
    use crate::buffer::{MemoryStore, Segment, StreamId};
    use crate::session::StreamState;

    /// Records delivered sequence numbers and release instants
    struct RecordingSink {
        tx: mpsc::UnboundedSender<(u64, Instant)>,
        fail_on: Option<u64>,
    }

    impl SegmentSink for RecordingSink {
        async fn open(&mut self) -> Result<(), SinkError> {
            Ok(())
        }

        async fn deliver(&mut self, segment: &Segment) -> Result<(), SinkError> {
            if self.fail_on == Some(segment.sequence) {
                return Err(SinkError::Send(std::io::Error::other("unreachable")));
            }
            let _ = self.tx.send((segment.sequence, Instant::now()));
            Ok(())
        }
    }

    fn recording(fail_on: Option<u64>) -> (RecordingSink, mpsc::UnboundedReceiver<(u64, Instant)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RecordingSink { tx, fail_on }, rx)
    }

    async fn put(store: &MemoryStore, stream: &str, sequence: u64) {
        store
            .put(Segment::new(
                StreamId::new(stream),
                sequence,
                Duration::from_secs(1),
                Bytes::from_static(&[0x47; 188]),
            ))
            .await
            .unwrap();
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<(u64, Instant)>) -> Vec<u64> {
        let mut out = Vec::new();
        while let Ok((seq, _)) = rx.try_recv() {
            out.push(seq);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_after_delay() {
        // delay=2s, one segment per second at t=0..4, observed at t=4.5
        let store = Arc::new(MemoryStore::new());
        let ctx = PipelineContext::new(StreamId::new("s"));
        let (sink, mut rx) = recording(None);
        let mut gate = DelayGate::new(
            Arc::clone(&store),
            sink,
            Duration::from_secs(2),
            DEFAULT_POLL_INTERVAL,
            ctx.clone(),
        );

        for seq in 0..5 {
            put(&store, "s", seq).await;
            if seq < 4 {
                tokio::time::advance(Duration::from_secs(1)).await;
            }
        }
        tokio::time::advance(Duration::from_millis(500)).await;

        while gate.release_next().await.unwrap() {}

        assert_eq!(drain(&mut rx), vec![0, 1, 2]);
        assert_eq!(store.len(&ctx.stream_id).await, 2);
        assert_eq!(ctx.counters.snapshot().segments_released, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_released_early() {
        let store = Arc::new(MemoryStore::new());
        let ctx = PipelineContext::new(StreamId::new("s"));
        let (sink, mut rx) = recording(None);
        let delay = Duration::from_secs(3);
        let gate = DelayGate::new(Arc::clone(&store), sink, delay, DEFAULT_POLL_INTERVAL, ctx.clone());
        let task = tokio::spawn(gate.run());

        let mut arrivals = Vec::new();
        for seq in 0..10 {
            arrivals.push(Instant::now());
            put(&store, "s", seq).await;
            tokio::time::sleep(Duration::from_millis(700)).await;
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
        ctx.cancel.cancel();
        task.await.unwrap().unwrap();

        let mut released = Vec::new();
        while let Ok((seq, at)) = rx.try_recv() {
            assert!(at >= arrivals[seq as usize] + delay, "segment {} released early", seq);
            released.push(seq);
        }
        assert_eq!(released, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_passthrough() {
        let store = Arc::new(MemoryStore::new());
        let ctx = PipelineContext::new(StreamId::new("s"));
        let (sink, mut rx) = recording(None);
        let mut gate = DelayGate::new(Arc::clone(&store), sink, Duration::ZERO, DEFAULT_POLL_INTERVAL, ctx);

        put(&store, "s", 0).await;
        put(&store, "s", 1).await;

        assert!(gate.release_next().await.unwrap());
        assert!(gate.release_next().await.unwrap());
        assert!(!gate.release_next().await.unwrap());
        assert_eq!(drain(&mut rx), vec![0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_skips_segment() {
        let store = Arc::new(MemoryStore::new());
        let ctx = PipelineContext::new(StreamId::new("s"));
        ctx.mark_running();
        let (sink, mut rx) = recording(Some(1));
        let mut gate = DelayGate::new(Arc::clone(&store), sink, Duration::ZERO, DEFAULT_POLL_INTERVAL, ctx.clone());

        for seq in 0..4 {
            put(&store, "s", seq).await;
        }
        while gate.release_next().await.unwrap() {}

        assert_eq!(drain(&mut rx), vec![0, 2, 3]);
        assert_eq!(store.len(&ctx.stream_id).await, 0);
        assert_eq!(ctx.state(), StreamState::Running);

        let stats = ctx.counters.snapshot();
        assert_eq!(stats.segments_released, 3);
        assert_eq!(stats.sink_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_streams() {
        let store = Arc::new(MemoryStore::new());
        let fast_ctx = PipelineContext::new(StreamId::new("fast"));
        let slow_ctx = PipelineContext::new(StreamId::new("slow"));
        let (fast_sink, mut fast_rx) = recording(None);
        let (slow_sink, mut slow_rx) = recording(None);

        let fast = tokio::spawn(
            DelayGate::new(Arc::clone(&store), fast_sink, Duration::from_secs(1), DEFAULT_POLL_INTERVAL, fast_ctx.clone()).run(),
        );
        let slow = tokio::spawn(
            DelayGate::new(Arc::clone(&store), slow_sink, Duration::from_secs(10), DEFAULT_POLL_INTERVAL, slow_ctx.clone()).run(),
        );

        let start = Instant::now();
        for seq in 0..5 {
            put(&store, "fast", seq).await;
            put(&store, "slow", seq).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        tokio::time::sleep(Duration::from_secs(2)).await;

        // t=7s: every fast segment is out, the slow stream has released nothing
        assert_eq!(drain(&mut fast_rx), vec![0, 1, 2, 3, 4]);
        assert!(drain(&mut slow_rx).is_empty());
        assert_eq!(store.len(&slow_ctx.stream_id).await, 5);

        tokio::time::sleep_until(start + Duration::from_millis(12_500)).await;
        assert_eq!(drain(&mut slow_rx), vec![0, 1, 2]);

        fast_ctx.cancel.cancel();
        slow_ctx.cancel.cancel();
        fast.await.unwrap().unwrap();
        slow.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_fatal_open_error() {
        struct BrokenSink;

        impl SegmentSink for BrokenSink {
            async fn open(&mut self) -> Result<(), SinkError> {
                Err(SinkError::Setup {
                    target: "nowhere".into(),
                    source: std::io::Error::other("denied"),
                })
            }

            async fn deliver(&mut self, _segment: &Segment) -> Result<(), SinkError> {
                Ok(())
            }
        }

        let ctx = PipelineContext::new(StreamId::new("s"));
        let gate = DelayGate::new(
            Arc::new(MemoryStore::new()),
            BrokenSink,
            Duration::ZERO,
            DEFAULT_POLL_INTERVAL,
            ctx,
        );

        assert!(gate.run().await.unwrap_err().is_fatal());
    }
}
