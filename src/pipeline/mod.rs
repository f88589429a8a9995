//! Per-stream pipeline tasks
//!
//! Every running stream owns three independent tasks sharing one
//! [`PipelineContext`]:
//!
//! ```text
//!   source ──► [capture] ──put──► SegmentStore ──peek/remove──► [gate] ──► sink
//!                                      ▲
//!                                      └──purge── [sweeper]
//! ```
//!
//! A task that ends with an error moves the stream to `Stopping` and cancels
//! its siblings. Failures never cross stream boundaries.

pub mod context;
pub mod gate;
pub mod sweeper;

use tokio::task::JoinHandle;

use crate::buffer::SegmentStore;
use crate::egress::SegmentSink;
use crate::ingest::{Capture, SegmentWriter};

pub use context::PipelineContext;
pub use gate::{DelayGate, DEFAULT_POLL_INTERVAL};
pub use sweeper::{RetentionSweeper, DEFAULT_RETENTION_GRACE, DEFAULT_SWEEP_INTERVAL};

/// Spawn the capture loop of a stream
pub fn spawn_capture<S: SegmentStore>(capture: Capture, writer: SegmentWriter<S>) -> JoinHandle<()> {
    let ctx = writer.context().clone();

    tokio::spawn(async move {
        if let Err(e) = capture.run(writer).await {
            ctx.fail("capture", &e);
        }
    })
}

/// Spawn the delay gate of a stream
pub fn spawn_gate<S, K>(gate: DelayGate<S, K>, ctx: PipelineContext) -> JoinHandle<()>
where
    S: SegmentStore,
    K: SegmentSink + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = gate.run().await {
            ctx.fail("gate", &e);
        }
    })
}

/// Spawn the retention sweeper of a stream
pub fn spawn_sweeper<S: SegmentStore>(sweeper: RetentionSweeper<S>) -> JoinHandle<()> {
    tokio::spawn(sweeper.run())
}
