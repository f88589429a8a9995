//! Sink error types

use std::path::PathBuf;

/// Error type for sink operations
#[derive(Debug)]
pub enum SinkError {
    /// Sink could not be set up (socket bind, output directory)
    Setup { target: String, source: std::io::Error },
    /// `deliver` called before a successful `open`
    NotOpen,
    /// Datagram send failed
    Send(std::io::Error),
    /// Segment or playlist file write failed
    Write { path: PathBuf, source: std::io::Error },
}

impl SinkError {
    /// Whether the sink cannot continue
    ///
    /// Fatal errors stop the stream; anything else skips one segment.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SinkError::Setup { .. } | SinkError::NotOpen)
    }
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Setup { target, source } => {
                write!(f, "Failed to set up sink {}: {}", target, source)
            }
            SinkError::NotOpen => write!(f, "Sink not open"),
            SinkError::Send(e) => write!(f, "Send failed: {}", e),
            SinkError::Write { path, source } => {
                write!(f, "Write to {} failed: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Setup { source, .. } | SinkError::Write { source, .. } => Some(source),
            SinkError::Send(e) => Some(e),
            SinkError::NotOpen => None,
        }
    }
}
