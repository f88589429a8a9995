//! Buffer error types

use super::segment::StreamId;

/// Error type for segment buffer operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// A segment with this (stream, sequence) pair is already buffered
    DuplicateSequence { stream: StreamId, sequence: u64 },
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::DuplicateSequence { stream, sequence } => {
                write!(f, "Duplicate segment sequence {} for stream {}", sequence, stream)
            }
        }
    }
}

impl std::error::Error for BufferError {}
