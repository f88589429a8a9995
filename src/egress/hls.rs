//! HLS packaging sink
//!
//! Each released segment becomes `segment_<sequence>.ts` in the stream's
//! output directory, and the rolling `playlist.m3u8` is rewritten to list the
//! newest N files. Files that fall out of the window are deleted.
//!
//! ```text
//!   hls_root/
//!   └── <stream>/
//!       ├── playlist.m3u8        (replaced atomically via playlist.m3u8.tmp)
//!       ├── segment_41.ts
//!       ├── ...
//!       └── segment_45.ts
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::error::SinkError;
use super::playlist::{segment_file_name, Playlist, PlaylistEntry, PLAYLIST_FILE};
use super::SegmentSink;
use crate::buffer::{Segment, StreamId};
use crate::session::config::is_safe_name;

/// Default number of segments kept in the playlist
pub const DEFAULT_PLAYLIST_WINDOW: usize = 5;

/// Writes released segments as HLS files
#[derive(Debug)]
pub struct HlsSink {
    stream_id: StreamId,
    dir: PathBuf,
    playlist: Playlist,
    opened: bool,
}

impl HlsSink {
    /// Create a sink writing into `dir`
    pub fn new(stream_id: StreamId, dir: impl Into<PathBuf>, window: usize) -> Self {
        Self {
            stream_id,
            dir: dir.into(),
            playlist: Playlist::new(window),
            opened: false,
        }
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Current playlist window
    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    async fn write_segment(&self, path: &Path, segment: &Segment) -> Result<(), SinkError> {
        tokio::fs::write(path, &segment.payload)
            .await
            .map_err(|source| SinkError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn remove_evicted(&self, evicted: Vec<PlaylistEntry>) {
        for entry in evicted {
            let path = self.dir.join(&entry.file_name);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        stream = %self.stream_id,
                        path = %path.display(),
                        error = %e,
                        "Failed to delete evicted segment"
                    );
                }
            }
        }
    }

    /// Replace the manifest without exposing a partial write
    async fn write_manifest(&self) -> Result<(), SinkError> {
        let tmp = self.dir.join(format!("{}.tmp", PLAYLIST_FILE));
        let path = self.dir.join(PLAYLIST_FILE);

        tokio::fs::write(&tmp, self.playlist.render())
            .await
            .map_err(|source| SinkError::Write {
                path: tmp.clone(),
                source,
            })?;

        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| SinkError::Write { path, source })
    }
}

impl SegmentSink for HlsSink {
    async fn open(&mut self) -> Result<(), SinkError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| SinkError::Setup {
                target: self.dir.display().to_string(),
                source,
            })?;

        tracing::info!(
            stream = %self.stream_id,
            dir = %self.dir.display(),
            "HLS sink ready"
        );
        self.opened = true;
        Ok(())
    }

    async fn deliver(&mut self, segment: &Segment) -> Result<(), SinkError> {
        if !self.opened {
            return Err(SinkError::NotOpen);
        }

        // Already evicted from the window
        if !self.playlist.is_empty() && segment.sequence < self.playlist.media_sequence() {
            tracing::debug!(
                stream = %self.stream_id,
                sequence = segment.sequence,
                "Segment older than playlist window"
            );
            return Ok(());
        }

        let path = self.dir.join(segment_file_name(segment.sequence));
        self.write_segment(&path, segment).await?;

        // A re-delivered segment rewrites its file but is already listed
        if self
            .playlist
            .newest_sequence()
            .is_some_and(|newest| segment.sequence <= newest)
        {
            tracing::debug!(
                stream = %self.stream_id,
                sequence = segment.sequence,
                "Segment already in playlist"
            );
            return Ok(());
        }

        let entry = PlaylistEntry::new(
            self.stream_id.clone(),
            segment.sequence,
            segment.duration,
            Utc::now(),
        );
        let evicted = self.playlist.push(entry);
        self.remove_evicted(evicted).await;

        self.write_manifest().await
    }
}

/// Resolve a manifest or segment file inside an HLS output directory
///
/// Returns `None` for names that are not a single safe path component or for
/// files that do not exist.
pub async fn resolve_file(dir: &Path, file_name: &str) -> Option<PathBuf> {
    if !is_safe_name(file_name) {
        return None;
    }

    let path = dir.join(file_name);
    match tokio::fs::try_exists(&path).await {
        Ok(true) => Some(path),
        _ => None,
    }
}
