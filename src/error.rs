//! Unified error type

use std::fmt;
use std::io;

use crate::buffer::BufferError;
use crate::egress::SinkError;
use crate::ingest::CaptureError;
use crate::registry::RegistryError;
use crate::session::ConfigError;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(io::Error),
    /// Invalid stream configuration
    Config(ConfigError),
    /// Registry operation failed
    Registry(RegistryError),
    /// Source could not be opened or read
    Capture(CaptureError),
    /// Segment buffer rejected an operation
    Buffer(BufferError),
    /// Sink could not be opened or written
    Sink(SinkError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Registry(e) => write!(f, "Registry error: {}", e),
            Error::Capture(e) => write!(f, "Capture error: {}", e),
            Error::Buffer(e) => write!(f, "Buffer error: {}", e),
            Error::Sink(e) => write!(f, "Sink error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Config(e) => Some(e),
            Error::Registry(e) => Some(e),
            Error::Capture(e) => Some(e),
            Error::Buffer(e) => Some(e),
            Error::Sink(e) => Some(e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<RegistryError> for Error {
    fn from(err: RegistryError) -> Self {
        Error::Registry(err)
    }
}

impl From<CaptureError> for Error {
    fn from(err: CaptureError) -> Self {
        Error::Capture(err)
    }
}

impl From<BufferError> for Error {
    fn from(err: BufferError) -> Self {
        Error::Buffer(err)
    }
}

impl From<SinkError> for Error {
    fn from(err: SinkError) -> Self {
        Error::Sink(err)
    }
}
