//! Stream session configuration and lifecycle
//!
//! This module provides:
//! - [`StreamConfig`]: what a relay session captures, how long it delays, and
//!   where it delivers
//! - [`StreamState`]: the Starting → Running → Stopping → Stopped lifecycle
//! - [`ConfigError`]: configuration problems reported at start time

pub mod config;
pub mod error;
pub mod state;

pub use config::{
    ResolvedEndpoints, SinkEndpoint, SinkKind, SourceEndpoint, SourceKind, StreamConfig,
    DEFAULT_SEGMENT_DURATION,
};
pub use error::ConfigError;
pub use state::{StateCell, StreamState};
