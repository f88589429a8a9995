//! Capture error types

use crate::buffer::BufferError;

/// Error type for ingest capture
#[derive(Debug)]
pub enum CaptureError {
    /// Could not bind or join the source socket
    Bind(std::io::Error),
    /// Socket receive failed
    Recv(std::io::Error),
    /// HTTP request for a playlist or segment failed
    Http(reqwest::Error),
    /// Upstream playlist could not be parsed
    Playlist(String),
    /// Segment URI in the upstream playlist could not be resolved
    SegmentUri(String),
    /// The pulled source failed too many polls in a row
    SourceUnavailable { attempts: u32 },
    /// Segment buffer rejected a captured segment
    Buffer(BufferError),
}

impl CaptureError {
    /// Whether a pulled source should keep polling after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CaptureError::Http(_) | CaptureError::Playlist(_) | CaptureError::SegmentUri(_)
        )
    }
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::Bind(e) => write!(f, "Failed to open source socket: {}", e),
            CaptureError::Recv(e) => write!(f, "Source read failed: {}", e),
            CaptureError::Http(e) => write!(f, "Source request failed: {}", e),
            CaptureError::Playlist(msg) => write!(f, "Invalid source playlist: {}", msg),
            CaptureError::SegmentUri(uri) => write!(f, "Invalid segment URI: {}", uri),
            CaptureError::SourceUnavailable { attempts } => {
                write!(f, "Source unavailable after {} attempts", attempts)
            }
            CaptureError::Buffer(e) => write!(f, "Buffer error: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Bind(e) | CaptureError::Recv(e) => Some(e),
            CaptureError::Http(e) => Some(e),
            CaptureError::Buffer(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CaptureError {
    fn from(err: reqwest::Error) -> Self {
        CaptureError::Http(err)
    }
}

impl From<BufferError> for CaptureError {
    fn from(err: BufferError) -> Self {
        CaptureError::Buffer(err)
    }
}
