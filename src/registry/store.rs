//! Stream registry implementation
//!
//! The central registry that starts, supervises and stops relayed streams.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::RwLock;

use super::config::RelayConfig;
use super::entry::{StreamEntry, StreamInfo};
use super::error::RegistryError;
use crate::buffer::{MemoryStore, SegmentStore, StreamId};
use crate::egress::{resolve_file, Egress, HlsSink, UdpSink};
use crate::error::Result;
use crate::ingest::{Capture, CaptureError, PulledCapture, SegmentWriter, UdpCapture};
use crate::pipeline::{self, DelayGate, PipelineContext, RetentionSweeper};
use crate::session::{ConfigError, SinkEndpoint, SourceEndpoint, StreamConfig, StreamState};

/// Counter behind generated `stream-<n>` ids, shared by every registry
static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Central registry for all relayed streams
///
/// Thread-safe via `RwLock`. Each entry carries its own atomic state and task
/// list, so lookups never wait on another stream's shutdown.
pub struct StreamRegistry<S: SegmentStore = MemoryStore> {
    /// Map of stream id to stream entry
    streams: RwLock<HashMap<StreamId, Arc<StreamEntry>>>,

    /// Segment buffer shared by every stream
    store: Arc<S>,

    /// Configuration
    config: RelayConfig,
}

impl StreamRegistry<MemoryStore> {
    /// Create a new registry with an in-memory buffer and default configuration
    pub fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    /// Create a new registry with an in-memory buffer and custom configuration
    pub fn with_config(config: RelayConfig) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), config)
    }
}

impl<S: SegmentStore> StreamRegistry<S> {
    /// Create a registry backed by a custom segment store
    pub fn with_store(store: Arc<S>, config: RelayConfig) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            store,
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Get the segment buffer
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Start relaying a stream
    ///
    /// Validates the config and binds the source before anything is
    /// registered, so configuration and bind errors are returned here. Sink
    /// setup happens in the background; a failure there stops the stream.
    pub async fn start(&self, mut config: StreamConfig) -> Result<StreamId> {
        let endpoints = config.resolve()?;
        let capture = self.open_capture(&endpoints.source, &config).await?;

        let mut streams = self.streams.write().await;

        let id = match &config.stream_id {
            Some(id) if streams.contains_key(id) => {
                return Err(RegistryError::DuplicateStream(id.clone()).into());
            }
            Some(id) => id.clone(),
            None => loop {
                let candidate = StreamId::new(format!(
                    "stream-{}",
                    NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed)
                ));
                if !streams.contains_key(&candidate) {
                    break candidate;
                }
            },
        };
        let (sink, hls_dir) = self.build_sink(&endpoints.sink, &id);
        if let Some(dir) = &hls_dir {
            // Entries still stopping keep their directory until finalized
            if streams.values().any(|entry| entry.hls_dir() == Some(dir.as_path())) {
                return Err(ConfigError::DuplicateSinkTarget(dir.display().to_string()).into());
            }
        }
        config.stream_id = Some(id.clone());

        let ctx = PipelineContext::new(id.clone());

        let writer = SegmentWriter::new(Arc::clone(&self.store), ctx.clone());
        let gate = DelayGate::new(
            Arc::clone(&self.store),
            sink,
            config.delay,
            self.config.poll_interval,
            ctx.clone(),
        );
        let sweeper = RetentionSweeper::new(
            Arc::clone(&self.store),
            config.delay,
            self.config.retention_grace,
            self.config.sweep_interval,
            ctx.clone(),
        );

        let tasks = vec![
            pipeline::spawn_capture(capture, writer),
            pipeline::spawn_gate(gate, ctx.clone()),
            pipeline::spawn_sweeper(sweeper),
        ];

        tracing::info!(
            stream = %id,
            source = %config.source_address,
            source_kind = %config.source_kind,
            sink = %config.sink_target,
            sink_kind = %config.sink_kind,
            delay_ms = config.delay.as_millis() as u64,
            "Stream started"
        );

        let entry = StreamEntry::new(config, ctx, tasks, hls_dir);
        streams.insert(id.clone(), Arc::new(entry));

        Ok(id)
    }

    async fn open_capture(
        &self,
        source: &SourceEndpoint,
        config: &StreamConfig,
    ) -> std::result::Result<Capture, CaptureError> {
        match source {
            SourceEndpoint::Udp(addr) => {
                UdpCapture::bind(*addr, config.segment_duration, self.config.udp_recv_buffer)
                    .await
                    .map(Capture::Udp)
            }
            SourceEndpoint::Pulled(url) => {
                let client = Client::builder()
                    .timeout(self.config.http_timeout)
                    .build()?;
                let interval = self.config.pull_interval.unwrap_or(config.segment_duration);

                Ok(Capture::Pulled(PulledCapture::new(
                    client,
                    url.clone(),
                    interval,
                    config.segment_duration,
                    self.config.max_pull_failures,
                )))
            }
        }
    }

    fn build_sink(&self, sink: &SinkEndpoint, id: &StreamId) -> (Egress, Option<PathBuf>) {
        match sink {
            SinkEndpoint::Udp(addr) => (
                Egress::Udp(UdpSink::new(
                    *addr,
                    self.config.udp_payload_size,
                    self.config.multicast_ttl,
                )),
                None,
            ),
            SinkEndpoint::Hls(dir_name) => {
                let dir = self
                    .config
                    .hls_root
                    .join(dir_name.as_deref().unwrap_or(id.as_str()));
                let sink = HlsSink::new(id.clone(), dir.clone(), self.config.playlist_window);
                (Egress::Hls(sink), Some(dir))
            }
        }
    }

    /// Stop a stream
    ///
    /// Cancels its tasks, waits for them to exit, and purges its buffered
    /// segments. Only the first of several concurrent calls does the work;
    /// the others get `StreamNotFound`.
    pub async fn stop(&self, id: &StreamId) -> std::result::Result<(), RegistryError> {
        let entry = self
            .streams
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::StreamNotFound(id.clone()))?;

        if !entry.claim_stop() {
            return Err(RegistryError::StreamNotFound(id.clone()));
        }

        entry.ctx.state.mark_stopping();
        entry.ctx.cancel.cancel();
        tracing::info!(stream = %id, "Stopping stream");

        self.finalize(&entry).await;
        Ok(())
    }

    /// Wait for the stream's tasks, purge its buffer and drop the entry
    async fn finalize(&self, entry: &StreamEntry) {
        entry.join_tasks().await;

        let purged = self.store.purge_stream(entry.id()).await;
        entry.ctx.state.mark_stopped();
        self.streams.write().await.remove(entry.id());

        let stats = entry.ctx.counters.snapshot();
        tracing::info!(
            stream = %entry.id(),
            purged = purged,
            captured = stats.segments_captured,
            released = stats.segments_released,
            swept = stats.segments_swept,
            sink_failures = stats.sink_failures,
            "Stream stopped"
        );
    }

    /// Snapshot every registered stream, ordered by id
    pub async fn list(&self) -> Vec<StreamInfo> {
        let streams = self.streams.read().await;
        let mut infos: Vec<StreamInfo> = streams.values().map(|entry| entry.info()).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Snapshot one stream
    pub async fn get(&self, id: &StreamId) -> Option<StreamInfo> {
        self.streams.read().await.get(id).map(|entry| entry.info())
    }

    /// Lifecycle state of a stream
    pub async fn state(&self, id: &StreamId) -> Option<StreamState> {
        self.streams.read().await.get(id).map(|entry| entry.state())
    }

    /// Get total number of streams
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }

    /// Resolve the playlist or a segment file of an HLS stream
    ///
    /// Non-HLS streams are reported as `StreamNotFound`.
    pub async fn hls_file(
        &self,
        id: &StreamId,
        file_name: &str,
    ) -> std::result::Result<PathBuf, RegistryError> {
        let dir = {
            let streams = self.streams.read().await;
            streams
                .get(id)
                .and_then(|entry| entry.hls_dir().map(|dir| dir.to_path_buf()))
                .ok_or_else(|| RegistryError::StreamNotFound(id.clone()))?
        };

        resolve_file(&dir, file_name)
            .await
            .ok_or_else(|| RegistryError::FileNotFound(file_name.to_string()))
    }

    /// Run cleanup task once
    ///
    /// Finalizes streams that stopped themselves after a fatal error.
    pub async fn cleanup(&self) {
        let failed: Vec<Arc<StreamEntry>> = self
            .streams
            .read()
            .await
            .values()
            .filter(|entry| entry.state() == StreamState::Stopping)
            .cloned()
            .collect();

        for entry in failed {
            if entry.claim_stop() {
                tracing::info!(stream = %entry.id(), "Stream removed by cleanup");
                self.finalize(&entry).await;
            }
        }
    }

    /// Spawn background cleanup task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.cleanup().await;
            }
        })
    }

    /// Stop every registered stream
    pub async fn shutdown(&self) {
        let ids: Vec<StreamId> = self.streams.read().await.keys().cloned().collect();

        for id in ids {
            // A stream may be finalized by cleanup in the meantime
            let _ = self.stop(&id).await;
        }
    }
}

impl Default for StreamRegistry<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::UdpSocket;

    use super::*;
    use crate::error::Error;
    use crate::session::{SinkKind, SourceKind};

    fn udp_config(sink_target: &str) -> StreamConfig {
        StreamConfig::new(SourceKind::Udp, "127.0.0.1:0", SinkKind::Udp, sink_target)
    }

    async fn wait_for_state(registry: &StreamRegistry, id: &StreamId, state: StreamState) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.state(id).await != Some(state) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let registry = StreamRegistry::new();
        let id = registry.start(udp_config("127.0.0.1:9")).await.unwrap();

        assert_eq!(registry.stream_count().await, 1);
        assert_eq!(registry.state(&id).await, Some(StreamState::Starting));

        registry.stop(&id).await.unwrap();
        assert_eq!(registry.stream_count().await, 0);
        assert_eq!(registry.state(&id).await, None);

        // Second stop on the same id
        let result = registry.stop(&id).await;
        assert_eq!(result, Err(RegistryError::StreamNotFound(id)));
    }

    #[tokio::test]
    async fn test_concurrent_stop() {
        let registry = StreamRegistry::new();
        let id = registry.start(udp_config("127.0.0.1:9")).await.unwrap();

        let (a, b) = tokio::join!(registry.stop(&id), registry.stop(&id));

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| *r == Err(RegistryError::StreamNotFound(id.clone()))));
        assert_eq!(registry.stream_count().await, 0);
    }

    #[tokio::test]
    async fn test_hls_directory_not_shared() {
        let root = tempfile::tempdir().unwrap();
        let registry = StreamRegistry::with_config(RelayConfig::default().hls_root(root.path()));
        let hls = |target: &str| StreamConfig::new(SourceKind::Udp, "127.0.0.1:0", SinkKind::Hls, target);

        let first = registry.start(hls("shared")).await.unwrap();

        // Same target
        assert!(matches!(
            registry.start(hls("shared")).await,
            Err(Error::Config(ConfigError::DuplicateSinkTarget(_)))
        ));
        // Empty target falling back to an id equal to the taken directory
        assert!(matches!(
            registry.start(hls("").id("shared")).await,
            Err(Error::Config(ConfigError::DuplicateSinkTarget(_)))
        ));
        assert_eq!(registry.stream_count().await, 1);

        // A different directory is fine, and the freed one can be reused
        registry.start(hls("other")).await.unwrap();
        registry.stop(&first).await.unwrap();
        let again = registry.start(hls("shared")).await.unwrap();
        assert_ne!(again, first);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_one_multicast_feed_two_delays() {
        let registry = StreamRegistry::new();
        let port = UdpSocket::bind("0.0.0.0:0").await.unwrap().local_addr().unwrap().port();
        let source = format!("239.255.10.10:{}", port);

        let short = StreamConfig::new(SourceKind::Udp, source.as_str(), SinkKind::Udp, "127.0.0.1:9")
            .delay(Duration::from_secs(1));
        let long = StreamConfig::new(SourceKind::Udp, source.as_str(), SinkKind::Udp, "127.0.0.1:9")
            .delay(Duration::from_secs(10));

        let a = registry.start(short).await.unwrap();
        let b = registry.start(long).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.stream_count().await, 2);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_generated_ids_are_unique() {
        let registry = StreamRegistry::new();
        let a = registry.start(udp_config("127.0.0.1:9")).await.unwrap();
        let b = registry.start(udp_config("127.0.0.1:9")).await.unwrap();

        assert_ne!(a, b);
        assert!(a.as_str().starts_with("stream-"));
        assert!(b.as_str().starts_with("stream-"));

        registry.shutdown().await;
        assert_eq!(registry.stream_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_stream() {
        let registry = StreamRegistry::new();
        registry
            .start(udp_config("127.0.0.1:9").id("news"))
            .await
            .unwrap();

        let result = registry.start(udp_config("127.0.0.1:9").id("news")).await;
        assert!(matches!(
            result,
            Err(Error::Registry(RegistryError::DuplicateStream(_)))
        ));
        assert_eq!(registry.stream_count().await, 1);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let registry = StreamRegistry::new();

        let result = registry.start(udp_config("not an address")).await;
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidSinkTarget(_)))
        ));

        let config = StreamConfig::new(SourceKind::Pulled, "ftp://example.com/live.m3u8", SinkKind::Udp, "127.0.0.1:9");
        assert!(matches!(
            registry.start(config).await,
            Err(Error::Config(ConfigError::InvalidSourceAddress(_)))
        ));

        assert_eq!(registry.stream_count().await, 0);
    }

    #[tokio::test]
    async fn test_list_reports_config_and_state() {
        let registry = StreamRegistry::new();
        let config = udp_config("127.0.0.1:9")
            .id("alpha")
            .delay(Duration::from_secs(30));
        let id = registry.start(config).await.unwrap();

        let infos = registry.list().await;
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].id, id);
        assert_eq!(infos[0].config.stream_id, Some(id.clone()));
        assert_eq!(infos[0].config.delay, Duration::from_secs(30));
        assert!(infos[0].state.is_live());
        assert_eq!(infos[0].stats.segments_captured, 0);

        registry.stop(&id).await.unwrap();
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_running_after_first_datagram() {
        let registry = StreamRegistry::new();
        let source = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = source.local_addr().unwrap().port();
        drop(source);

        let config = StreamConfig::new(
            SourceKind::Udp,
            format!("127.0.0.1:{}", port),
            SinkKind::Udp,
            "127.0.0.1:9",
        );
        let id = registry.start(config).await.unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(&[0x47; 188], ("127.0.0.1", port))
            .await
            .unwrap();

        wait_for_state(&registry, &id, StreamState::Running).await;
        registry.stop(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_hls_file_lookup() {
        let root = tempfile::tempdir().unwrap();
        let registry = StreamRegistry::with_config(RelayConfig::default().hls_root(root.path()));

        let hls = registry
            .start(StreamConfig::new(SourceKind::Udp, "127.0.0.1:0", SinkKind::Hls, "").id("tv"))
            .await
            .unwrap();
        let udp = registry.start(udp_config("127.0.0.1:9")).await.unwrap();

        // Nothing released yet
        assert_eq!(
            registry.hls_file(&hls, "playlist.m3u8").await,
            Err(RegistryError::FileNotFound("playlist.m3u8".into()))
        );
        assert_eq!(
            registry.hls_file(&hls, "../tv/playlist.m3u8").await,
            Err(RegistryError::FileNotFound("../tv/playlist.m3u8".into()))
        );
        assert_eq!(
            registry.hls_file(&udp, "playlist.m3u8").await,
            Err(RegistryError::StreamNotFound(udp.clone()))
        );
        let missing = StreamId::new("missing");
        assert_eq!(
            registry.hls_file(&missing, "playlist.m3u8").await,
            Err(RegistryError::StreamNotFound(missing))
        );

        // The directory defaults to the stream id
        tokio::time::timeout(Duration::from_secs(5), async {
            while !root.path().join("tv").is_dir() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        std::fs::write(root.path().join("tv").join("playlist.m3u8"), "#EXTM3U\n").unwrap();
        assert_eq!(
            registry.hls_file(&hls, "playlist.m3u8").await,
            Ok(root.path().join("tv").join("playlist.m3u8"))
        );

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_cleanup_finalizes_failed_stream() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let registry = StreamRegistry::with_config(RelayConfig::default().hls_root(&blocker));
        let id = registry
            .start(StreamConfig::new(SourceKind::Udp, "127.0.0.1:0", SinkKind::Hls, "out"))
            .await
            .unwrap();

        // The HLS directory cannot be created under a regular file
        wait_for_state(&registry, &id, StreamState::Stopping).await;
        assert_eq!(registry.stream_count().await, 1);

        registry.cleanup().await;
        assert_eq!(registry.stream_count().await, 0);
        assert_eq!(
            registry.stop(&id).await,
            Err(RegistryError::StreamNotFound(id))
        );
    }

    #[tokio::test]
    async fn test_failure_isolated_to_stream() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let registry = StreamRegistry::with_config(RelayConfig::default().hls_root(&blocker));
        let healthy = registry.start(udp_config("127.0.0.1:9")).await.unwrap();
        let broken = registry
            .start(StreamConfig::new(SourceKind::Udp, "127.0.0.1:0", SinkKind::Hls, "out"))
            .await
            .unwrap();

        wait_for_state(&registry, &broken, StreamState::Stopping).await;
        assert_eq!(registry.state(&healthy).await, Some(StreamState::Starting));

        registry.shutdown().await;
        assert_eq!(registry.stream_count().await, 0);
    }
}
