//! # ts-delay
//!
//! Time-shifted MPEG-TS relay. Captures a live transport stream, holds it in
//! a segment buffer for a configured delay, then re-emits it.
//!
//! Sources:
//! - UDP unicast or multicast
//! - Pulled HLS media playlist
//!
//! Outputs:
//! - UDP datagrams (unicast or multicast)
//! - HLS segment files with a rolling playlist
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use ts_delay::{RelayConfig, SinkKind, SourceKind, StreamConfig, StreamRegistry};
//!
//! #[tokio::main]
//! async fn main() -> ts_delay::Result<()> {
//!     let registry = Arc::new(StreamRegistry::with_config(RelayConfig::default()));
//!     let _cleanup = registry.spawn_cleanup_task();
//!
//!     let config = StreamConfig::new(SourceKind::Udp, "239.1.1.1:5000", SinkKind::Hls, "channel-1")
//!         .delay(Duration::from_secs(30));
//!     let id = registry.start(config).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     registry.stop(&id).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline
//!
//! Each stream runs a capture task, a delay gate (which drives the sink) and
//! a retention sweeper. See [`pipeline`] for how they share the buffer.

pub mod buffer;
pub mod egress;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod registry;
pub mod session;
pub mod stats;

pub use buffer::{MemoryStore, Segment, SegmentStore, StreamId};
pub use egress::{Egress, HlsSink, SegmentSink, UdpSink};
pub use error::{Error, Result};
pub use registry::{RelayConfig, StreamInfo, StreamRegistry};
pub use session::{SinkKind, SourceKind, StreamConfig, StreamState};
pub use stats::StreamStats;
