//! Per-stream relay statistics

pub mod metrics;

pub use metrics::{StreamCounters, StreamStats};
