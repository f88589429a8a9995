//! Ingest capture
//!
//! Reads raw transport-stream bytes from a source and writes completed,
//! sequence-numbered segments into the segment buffer.
//!
//! - [`UdpCapture`]: multicast/unicast UDP, split into fixed wall-clock spans
//! - [`PulledCapture`]: upstream HLS media playlist, one buffer segment per
//!   upstream segment
//!
//! Both loops race every blocking read or sleep against the stream's
//! cancellation token, so stopping a stream never waits on an idle source.

pub mod accumulator;
pub mod error;
pub mod pulled;
pub mod udp;
pub mod writer;

use crate::buffer::SegmentStore;

pub use accumulator::{Flushed, SegmentAccumulator};
pub use error::CaptureError;
pub use pulled::{PulledCapture, UpstreamSegment};
pub use udp::UdpCapture;
pub use writer::SegmentWriter;

/// Configured capture for one stream
#[derive(Debug)]
pub enum Capture {
    Udp(UdpCapture),
    Pulled(PulledCapture),
}

impl Capture {
    /// Run the capture loop until cancelled or a fatal error
    pub async fn run<S: SegmentStore>(self, writer: SegmentWriter<S>) -> Result<(), CaptureError> {
        match self {
            Capture::Udp(capture) => capture.run(writer).await,
            Capture::Pulled(capture) => capture.run(writer).await,
        }
    }
}
