//! Per-stream configuration
//!
//! A [`StreamConfig`] describes one relay pipeline: where to capture from,
//! how long to hold segments, and where to deliver them. Addresses are kept
//! as the caller supplied them and resolved by [`StreamConfig::resolve`] when
//! the stream is started.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;

use super::error::ConfigError;
use crate::buffer::StreamId;

/// Default segment duration (2 seconds)
pub const DEFAULT_SEGMENT_DURATION: Duration = Duration::from_secs(2);

/// Where a stream's bytes come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// UDP (usually multicast) transport stream
    Udp,
    /// Pulled HLS media playlist
    Pulled,
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(SourceKind::Udp),
            "pulled" | "hls" => Ok(SourceKind::Pulled),
            _ => Err(ConfigError::UnsupportedSource(s.to_string())),
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Udp => f.write_str("udp"),
            SourceKind::Pulled => f.write_str("pulled"),
        }
    }
}

/// Where released segments go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Raw datagrams to a UDP address
    Udp,
    /// Segment files plus a rolling playlist
    Hls,
}

impl FromStr for SinkKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(SinkKind::Udp),
            "hls" => Ok(SinkKind::Hls),
            _ => Err(ConfigError::UnsupportedSink(s.to_string())),
        }
    }
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkKind::Udp => f.write_str("udp"),
            SinkKind::Hls => f.write_str("hls"),
        }
    }
}

/// Configuration for a single relayed stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Requested stream id (assigned by the registry if `None`)
    pub stream_id: Option<StreamId>,

    /// Source type
    pub source_kind: SourceKind,

    /// `host:port` for UDP, playlist URL for pulled sources
    pub source_address: String,

    /// How long segments are held before release
    pub delay: Duration,

    /// Sink type
    pub sink_kind: SinkKind,

    /// `host:port` for UDP, directory name under the HLS root for HLS
    ///
    /// An empty HLS target means "use the stream id".
    pub sink_target: String,

    /// Wall-clock span of each captured segment
    pub segment_duration: Duration,
}

impl StreamConfig {
    /// Create a config with no delay and the default segment duration
    pub fn new(
        source_kind: SourceKind,
        source_address: impl Into<String>,
        sink_kind: SinkKind,
        sink_target: impl Into<String>,
    ) -> Self {
        Self {
            stream_id: None,
            source_kind,
            source_address: source_address.into(),
            delay: Duration::ZERO,
            sink_kind,
            sink_target: sink_target.into(),
            segment_duration: DEFAULT_SEGMENT_DURATION,
        }
    }

    /// Build a config from the raw start-stream request fields
    ///
    /// `stream_type` and `output_type` are parsed case-insensitively;
    /// `delay_secs` must be finite and non-negative.
    pub fn from_request(
        stream_type: &str,
        source: &str,
        delay_secs: f64,
        output_type: &str,
        output_address: &str,
    ) -> Result<Self, ConfigError> {
        let source_kind = stream_type.parse()?;
        let sink_kind = output_type.parse()?;
        let delay = Duration::try_from_secs_f64(delay_secs)
            .map_err(|_| ConfigError::InvalidDelay(delay_secs))?;

        Ok(Self::new(source_kind, source, sink_kind, output_address).delay(delay))
    }

    /// Request a specific stream id
    pub fn id(mut self, id: impl Into<StreamId>) -> Self {
        self.stream_id = Some(id.into());
        self
    }

    /// Set the release delay
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the segment duration
    pub fn segment_duration(mut self, duration: Duration) -> Self {
        self.segment_duration = duration;
        self
    }

    /// Validate the config and parse its addresses
    pub fn resolve(&self) -> Result<ResolvedEndpoints, ConfigError> {
        if self.segment_duration.is_zero() {
            return Err(ConfigError::InvalidSegmentDuration);
        }

        if let Some(id) = &self.stream_id {
            if !is_safe_name(id.as_str()) {
                return Err(ConfigError::InvalidStreamId(id.to_string()));
            }
        }

        let source = match self.source_kind {
            SourceKind::Udp => SocketAddr::from_str(self.source_address.trim())
                .map(SourceEndpoint::Udp)
                .map_err(|_| ConfigError::InvalidSourceAddress(self.source_address.clone()))?,
            SourceKind::Pulled => {
                let url = Url::parse(self.source_address.trim())
                    .map_err(|_| ConfigError::InvalidSourceAddress(self.source_address.clone()))?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(ConfigError::InvalidSourceAddress(
                        self.source_address.clone(),
                    ));
                }
                SourceEndpoint::Pulled(url)
            }
        };

        let sink = match self.sink_kind {
            SinkKind::Udp => SocketAddr::from_str(self.sink_target.trim())
                .map(SinkEndpoint::Udp)
                .map_err(|_| ConfigError::InvalidSinkTarget(self.sink_target.clone()))?,
            SinkKind::Hls => {
                let target = self.sink_target.trim();
                if target.is_empty() {
                    SinkEndpoint::Hls(None)
                } else if is_safe_name(target) {
                    SinkEndpoint::Hls(Some(target.to_string()))
                } else {
                    return Err(ConfigError::InvalidSinkTarget(self.sink_target.clone()));
                }
            }
        };

        Ok(ResolvedEndpoints { source, sink })
    }
}

/// Parsed source address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEndpoint {
    /// Local port to bind, and multicast group to join if the IP is multicast
    Udp(SocketAddr),
    /// Media playlist to poll
    Pulled(Url),
}

/// Parsed sink target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEndpoint {
    /// Destination address for datagrams
    Udp(SocketAddr),
    /// Directory name under the HLS root (`None` = stream id)
    Hls(Option<String>),
}

/// Source and sink of a validated config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoints {
    pub source: SourceEndpoint,
    pub sink: SinkEndpoint,
}

/// Whether `name` can be used as a single path component
pub(crate) fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
