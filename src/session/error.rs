//! Stream configuration error types

/// Error type for invalid stream configurations
///
/// Returned synchronously from `StreamRegistry::start`, before any task is
/// spawned.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Source type is not one the relay can capture from
    UnsupportedSource(String),
    /// Output type is not one the relay can deliver to
    UnsupportedSink(String),
    /// Source address could not be parsed
    InvalidSourceAddress(String),
    /// Output address or directory could not be parsed
    InvalidSinkTarget(String),
    /// Delay is negative, NaN or too large
    InvalidDelay(f64),
    /// Segment duration must be positive
    InvalidSegmentDuration,
    /// Requested stream id is empty or not usable as a directory name
    InvalidStreamId(String),
    /// HLS output directory is already written by another stream
    DuplicateSinkTarget(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::UnsupportedSource(kind) => write!(f, "Invalid stream type: {}", kind),
            ConfigError::UnsupportedSink(kind) => write!(f, "Invalid output type: {}", kind),
            ConfigError::InvalidSourceAddress(addr) => {
                write!(f, "Invalid source address: {}", addr)
            }
            ConfigError::InvalidSinkTarget(target) => {
                write!(f, "Invalid output address: {}", target)
            }
            ConfigError::InvalidDelay(delay) => write!(f, "Invalid delay: {}", delay),
            ConfigError::InvalidSegmentDuration => {
                write!(f, "Segment duration must be greater than zero")
            }
            ConfigError::InvalidStreamId(id) => write!(f, "Invalid stream id: {:?}", id),
            ConfigError::DuplicateSinkTarget(dir) => {
                write!(f, "Output directory already in use: {}", dir)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
