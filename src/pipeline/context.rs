//! Shared handle for one stream's background tasks

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::buffer::StreamId;
use crate::session::{StateCell, StreamState};
use crate::stats::StreamCounters;

/// State shared by the capture, gate and sweeper tasks of a stream
///
/// Cloning is cheap; every clone observes the same state, counters and
/// cancellation token.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Stream the tasks belong to
    pub stream_id: StreamId,
    /// Lifecycle state, shared with the registry
    pub state: Arc<StateCell>,
    /// Live counters
    pub counters: Arc<StreamCounters>,
    /// Cancelled when the stream stops for any reason
    pub cancel: CancellationToken,
}

impl PipelineContext {
    /// Create a context for a new stream in the `Starting` state
    pub fn new(stream_id: StreamId) -> Self {
        Self {
            stream_id,
            state: Arc::new(StateCell::new()),
            counters: Arc::new(StreamCounters::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> StreamState {
        self.state.get()
    }

    /// Record a successful capture iteration
    pub fn mark_running(&self) {
        if self.state.mark_running() {
            tracing::info!(stream = %self.stream_id, "Stream running");
        }
    }

    /// Stop this stream after an unrecoverable error
    ///
    /// Moves the stream to `Stopping` and cancels its sibling tasks. Other
    /// streams are unaffected; the registry finalizes the stream later.
    pub fn fail(&self, task: &'static str, error: &dyn std::fmt::Display) {
        if self.state.mark_stopping() {
            tracing::error!(
                stream = %self.stream_id,
                task = task,
                error = %error,
                "Fatal stream error, stopping"
            );
        }
        self.cancel.cancel();
    }

    /// Whether the stream has been told to stop
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
