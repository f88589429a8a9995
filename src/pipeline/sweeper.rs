//! Retention sweeper
//!
//! Bounds buffer growth when the delay gate falls behind or its sink keeps
//! failing. Segments older than `delay + grace` are dropped unreleased; the
//! grace period keeps the sweeper from racing the gate for segments that are
//! merely due.

use std::sync::Arc;
use std::time::Duration;

use super::context::PipelineContext;
use crate::buffer::SegmentStore;

/// Default time a segment may outlive its release deadline
pub const DEFAULT_RETENTION_GRACE: Duration = Duration::from_secs(60);

/// Default interval between sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Periodic purge of stale segments for one stream
pub struct RetentionSweeper<S> {
    store: Arc<S>,
    max_age: Duration,
    interval: Duration,
    ctx: PipelineContext,
}

impl<S: SegmentStore> RetentionSweeper<S> {
    /// Sweep segments older than `delay + grace` every `interval`
    pub fn new(
        store: Arc<S>,
        delay: Duration,
        grace: Duration,
        interval: Duration,
        ctx: PipelineContext,
    ) -> Self {
        Self {
            store,
            max_age: delay.saturating_add(grace),
            interval,
            ctx,
        }
    }

    /// Age at which segments are dropped
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Run one sweep, returning the number of segments removed
    pub async fn sweep_once(&self) -> usize {
        let removed = self
            .store
            .purge_older_than(&self.ctx.stream_id, self.max_age)
            .await;

        if removed > 0 {
            self.ctx.counters.record_swept(removed);
            tracing::warn!(
                stream = %self.ctx.stream_id,
                removed = removed,
                max_age_secs = self.max_age.as_secs(),
                "Swept stale segments"
            );
        }

        removed
    }

    /// Sweep periodically until cancelled
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.ctx.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }

        tracing::debug!(stream = %self.ctx.stream_id, "Retention sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::buffer::{MemoryStore, Segment, StreamId};

    async fn put(store: &MemoryStore, stream: &str, sequence: u64) {
        store
            .put(Segment::new(
                StreamId::new(stream),
                sequence,
                Duration::from_secs(1),
                Bytes::from_static(b"ts"),
            ))
            .await
            .unwrap();
    }

    fn sweeper(store: &Arc<MemoryStore>, ctx: &PipelineContext) -> RetentionSweeper<MemoryStore> {
        RetentionSweeper::new(
            Arc::clone(store),
            Duration::from_secs(2),
            Duration::from_secs(3),
            Duration::from_secs(1),
            ctx.clone(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_only_stale_segments() {
        let store = Arc::new(MemoryStore::new());
        let ctx = PipelineContext::new(StreamId::new("s"));
        let sweeper = sweeper(&store, &ctx);
        assert_eq!(sweeper.max_age(), Duration::from_secs(5));

        put(&store, "s", 0).await;
        tokio::time::advance(Duration::from_secs(3)).await;
        put(&store, "s", 1).await;
        tokio::time::advance(Duration::from_secs(3)).await;

        // seq 0 is 6s old, seq 1 is 3s old
        assert_eq!(sweeper.sweep_once().await, 1);
        assert_eq!(store.len(&ctx.stream_id).await, 1);
        assert_eq!(ctx.counters.snapshot().segments_swept, 1);

        assert_eq!(sweeper.sweep_once().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaves_other_streams() {
        let store = Arc::new(MemoryStore::new());
        let ctx = PipelineContext::new(StreamId::new("a"));
        let sweeper = sweeper(&store, &ctx);

        put(&store, "a", 0).await;
        put(&store, "b", 0).await;
        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(sweeper.sweep_once().await, 1);
        assert_eq!(store.len(&StreamId::new("b")).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_cancelled() {
        let store = Arc::new(MemoryStore::new());
        let ctx = PipelineContext::new(StreamId::new("s"));
        let task = tokio::spawn(sweeper(&store, &ctx).run());

        put(&store, "s", 0).await;
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        assert_eq!(store.len(&ctx.stream_id).await, 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.len(&ctx.stream_id).await, 0);

        ctx.cancel.cancel();
        task.await.unwrap();
    }
}
