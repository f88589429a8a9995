//! Time-indexed segment buffer
//!
//! Holds captured segments between ingest and delayed release. Each segment
//! is keyed by `(stream id, sequence number)` and stamped with its arrival
//! instant; the delay gate peeks the oldest segment whose arrival is at or
//! before `now - delay`, and the retention sweeper drops anything older than
//! `delay + grace`.
//!
//! ```text
//!   capture ──put()──►  ┌──────────────────────────────┐
//!                       │ stream "a": {0, 1, 2, 3}     │ ──peek/remove──► gate
//!                       │ stream "b": {17, 18}         │
//!                       └──────────────────────────────┘ ◄──purge── sweeper
//! ```
//!
//! Payloads are `bytes::Bytes`, so handing a segment to the gate is a
//! reference-count bump, not a copy.

pub mod error;
pub mod memory;
pub mod segment;
pub mod store;

pub use error::BufferError;
pub use memory::MemoryStore;
pub use segment::{Segment, StreamId};
pub use store::SegmentStore;
