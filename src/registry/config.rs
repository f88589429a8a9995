//! Relay configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::egress::{DEFAULT_PLAYLIST_WINDOW, DEFAULT_UDP_PAYLOAD_SIZE};
use crate::pipeline::{DEFAULT_POLL_INTERVAL, DEFAULT_RETENTION_GRACE, DEFAULT_SWEEP_INTERVAL};

/// Settings shared by every stream the registry starts
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Delay gate wait when nothing is eligible
    pub poll_interval: Duration,

    /// Interval between retention sweeps
    pub sweep_interval: Duration,

    /// Extra time past the delay before an unreleased segment is dropped
    pub retention_grace: Duration,

    /// Interval of the background task that finalizes failed streams
    pub cleanup_interval: Duration,

    /// Number of segments listed in an HLS playlist
    pub playlist_window: usize,

    /// Parent directory of every HLS stream directory
    pub hls_root: PathBuf,

    /// UDP capture receive buffer size
    pub udp_recv_buffer: usize,

    /// Maximum datagram payload for UDP egress
    pub udp_payload_size: usize,

    /// TTL for multicast UDP egress
    pub multicast_ttl: u32,

    /// Consecutive failed polls before a pulled source is declared unavailable
    pub max_pull_failures: u32,

    /// Per-request timeout for pulled sources
    pub http_timeout: Duration,

    /// Pulled source poll interval (`None` = the stream's segment duration)
    pub pull_interval: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            retention_grace: DEFAULT_RETENTION_GRACE,
            cleanup_interval: Duration::from_secs(1),
            playlist_window: DEFAULT_PLAYLIST_WINDOW,
            hls_root: PathBuf::from("hls_output"),
            udp_recv_buffer: 64 * 1024, // 64KB
            udp_payload_size: DEFAULT_UDP_PAYLOAD_SIZE,
            multicast_ttl: 16,
            max_pull_failures: 3,
            http_timeout: Duration::from_secs(10),
            pull_interval: None,
        }
    }
}

impl RelayConfig {
    /// Set the delay gate poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the retention sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the retention grace period
    pub fn retention_grace(mut self, grace: Duration) -> Self {
        self.retention_grace = grace;
        self
    }

    /// Set the cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set the HLS playlist window (at least 1)
    pub fn playlist_window(mut self, window: usize) -> Self {
        self.playlist_window = window.max(1);
        self
    }

    /// Set the HLS output root
    pub fn hls_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.hls_root = root.into();
        self
    }

    /// Set the UDP receive buffer size
    pub fn udp_recv_buffer(mut self, size: usize) -> Self {
        self.udp_recv_buffer = size;
        self
    }

    /// Set the UDP egress payload size
    pub fn udp_payload_size(mut self, size: usize) -> Self {
        self.udp_payload_size = size;
        self
    }

    /// Set the multicast TTL
    pub fn multicast_ttl(mut self, ttl: u32) -> Self {
        self.multicast_ttl = ttl;
        self
    }

    /// Set the pulled source failure limit
    pub fn max_pull_failures(mut self, max: u32) -> Self {
        self.max_pull_failures = max;
        self
    }

    /// Set the pulled source request timeout
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Poll pulled sources at a fixed interval
    pub fn pull_interval(mut self, interval: Duration) -> Self {
        self.pull_interval = Some(interval);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();

        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.retention_grace, Duration::from_secs(60));
        assert_eq!(config.cleanup_interval, Duration::from_secs(1));
        assert_eq!(config.playlist_window, 5);
        assert_eq!(config.hls_root, PathBuf::from("hls_output"));
        assert_eq!(config.udp_recv_buffer, 65536);
        assert_eq!(config.udp_payload_size, 1316);
        assert_eq!(config.multicast_ttl, 16);
        assert_eq!(config.max_pull_failures, 3);
        assert!(config.pull_interval.is_none());
    }

    #[test]
    fn test_builder_playlist_window_floor() {
        let config = RelayConfig::default().playlist_window(0);

        assert_eq!(config.playlist_window, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let config = RelayConfig::default()
            .poll_interval(Duration::from_millis(20))
            .sweep_interval(Duration::from_secs(1))
            .retention_grace(Duration::from_secs(10))
            .hls_root("/tmp/hls")
            .udp_payload_size(188)
            .pull_interval(Duration::from_millis(500));

        assert_eq!(config.poll_interval, Duration::from_millis(20));
        assert_eq!(config.sweep_interval, Duration::from_secs(1));
        assert_eq!(config.retention_grace, Duration::from_secs(10));
        assert_eq!(config.hls_root, PathBuf::from("/tmp/hls"));
        assert_eq!(config.udp_payload_size, 188);
        assert_eq!(config.pull_interval, Some(Duration::from_millis(500)));
    }
}
