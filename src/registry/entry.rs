//! Stream entry and snapshot types
//!
//! This module defines the per-stream state stored in the registry.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::buffer::StreamId;
use crate::pipeline::PipelineContext;
use crate::session::{StreamConfig, StreamState};
use crate::stats::StreamStats;

/// Entry for a single stream in the registry
pub struct StreamEntry {
    /// Config the stream was started with (id filled in)
    pub config: StreamConfig,

    /// Context shared with the stream's tasks
    pub(super) ctx: PipelineContext,

    /// Capture, gate and sweeper handles
    tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Set by whichever caller finalizes the stream first
    stop_claimed: AtomicBool,

    /// Output directory for HLS streams
    hls_dir: Option<PathBuf>,
}

impl StreamEntry {
    pub(super) fn new(
        config: StreamConfig,
        ctx: PipelineContext,
        tasks: Vec<JoinHandle<()>>,
        hls_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            config,
            ctx,
            tasks: Mutex::new(tasks),
            stop_claimed: AtomicBool::new(false),
            hls_dir,
        }
    }

    /// Stream id
    pub fn id(&self) -> &StreamId {
        &self.ctx.stream_id
    }

    /// Current lifecycle state
    pub fn state(&self) -> StreamState {
        self.ctx.state()
    }

    /// HLS output directory, if this is an HLS stream
    pub fn hls_dir(&self) -> Option<&Path> {
        self.hls_dir.as_deref()
    }

    /// Claim the right to finalize this stream
    ///
    /// Returns true for exactly one caller.
    pub(super) fn claim_stop(&self) -> bool {
        !self.stop_claimed.swap(true, Ordering::AcqRel)
    }

    /// Wait for every background task to exit
    pub(super) async fn join_tasks(&self) {
        let handles = std::mem::take(&mut *self.tasks.lock().await);

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(stream = %self.id(), error = %e, "Stream task panicked");
            }
        }
    }

    /// Take a point-in-time snapshot
    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            id: self.id().clone(),
            config: self.config.clone(),
            state: self.state(),
            stats: self.ctx.counters.snapshot(),
        }
    }
}

/// Snapshot of a registered stream
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Stream id
    pub id: StreamId,
    /// Config the stream was started with
    pub config: StreamConfig,
    /// Lifecycle state
    pub state: StreamState,
    /// Counter snapshot
    pub stats: StreamStats,
}
