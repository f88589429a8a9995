//! Egress dispatch
//!
//! Forwards segments released by the delay gate to the configured sink:
//!
//! - [`UdpSink`]: raw payload re-emitted as datagrams
//! - [`HlsSink`]: segment files plus a rolling playlist manifest
//!
//! Delivery must be idempotent: the gate removes a segment from the buffer
//! only after handing it over, so the same segment may be delivered twice
//! after an interruption.

pub mod error;
pub mod hls;
pub mod playlist;
pub mod udp;

use std::future::Future;

use crate::buffer::Segment;

pub use error::SinkError;
pub use hls::{resolve_file, HlsSink, DEFAULT_PLAYLIST_WINDOW};
pub use playlist::{
    segment_file_name, Playlist, PlaylistEntry, PLAYLIST_CONTENT_TYPE, PLAYLIST_FILE,
    SEGMENT_CONTENT_TYPE,
};
pub use udp::{UdpSink, DEFAULT_UDP_PAYLOAD_SIZE};

/// Destination for released segments
pub trait SegmentSink: Send {
    /// Prepare the sink (bind socket, create directories)
    ///
    /// An error here is fatal to the stream.
    fn open(&mut self) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Forward one segment
    fn deliver(&mut self, segment: &Segment) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Configured sink for one stream
#[derive(Debug)]
pub enum Egress {
    Udp(UdpSink),
    Hls(HlsSink),
}

impl SegmentSink for Egress {
    async fn open(&mut self) -> Result<(), SinkError> {
        match self {
            Egress::Udp(sink) => sink.open().await,
            Egress::Hls(sink) => sink.open().await,
        }
    }

    async fn deliver(&mut self, segment: &Segment) -> Result<(), SinkError> {
        match self {
            Egress::Udp(sink) => sink.deliver(segment).await,
            Egress::Hls(sink) => sink.deliver(segment).await,
        }
    }
}
