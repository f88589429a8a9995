//! Registry error types

use crate::buffer::StreamId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// No stream registered under this id
    StreamNotFound(StreamId),
    /// A stream with this id is already registered
    DuplicateStream(StreamId),
    /// Requested HLS file does not exist or is not servable
    FileNotFound(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::StreamNotFound(id) => write!(f, "Stream not found: {}", id),
            RegistryError::DuplicateStream(id) => write!(f, "Stream already exists: {}", id),
            RegistryError::FileNotFound(name) => write!(f, "File not found: {}", name),
        }
    }
}

impl std::error::Error for RegistryError {}
