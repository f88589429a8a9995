//! Rolling HLS media playlist
//!
//! Keeps the most recent N entries and renders them as a live media
//! playlist (no `#EXT-X-ENDLIST`). Each entry carries its wall-clock program
//! time for client-side synchronization.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::buffer::StreamId;

/// Manifest file name inside a stream's HLS directory
pub const PLAYLIST_FILE: &str = "playlist.m3u8";

/// MIME type of the manifest
pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// MIME type of segment files
pub const SEGMENT_CONTENT_TYPE: &str = "video/MP2T";

/// Segment file name for a sequence number
pub fn segment_file_name(sequence: u64) -> String {
    format!("segment_{}.ts", sequence)
}

/// One segment file listed in the playlist
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    pub stream_id: StreamId,
    pub file_name: String,
    pub sequence: u64,
    pub duration: Duration,
    pub program_time: DateTime<Utc>,
}

impl PlaylistEntry {
    pub fn new(
        stream_id: StreamId,
        sequence: u64,
        duration: Duration,
        program_time: DateTime<Utc>,
    ) -> Self {
        Self {
            stream_id,
            file_name: segment_file_name(sequence),
            sequence,
            duration,
            program_time,
        }
    }
}

/// Bounded window of playlist entries
#[derive(Debug)]
pub struct Playlist {
    entries: VecDeque<PlaylistEntry>,
    window: usize,
}

impl Playlist {
    /// Create an empty playlist holding at most `window` entries
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            entries: VecDeque::with_capacity(window + 1),
            window,
        }
    }

    /// Append an entry, returning the entries evicted from the window
    pub fn push(&mut self, entry: PlaylistEntry) -> Vec<PlaylistEntry> {
        self.entries.push_back(entry);

        let excess = self.entries.len().saturating_sub(self.window);
        self.entries.drain(..excess).collect()
    }

    /// Sequence number of the newest entry
    pub fn newest_sequence(&self) -> Option<u64> {
        self.entries.back().map(|e| e.sequence)
    }

    /// Media sequence of the playlist (sequence of the oldest live entry)
    pub fn media_sequence(&self) -> u64 {
        self.entries.front().map(|e| e.sequence).unwrap_or(0)
    }

    /// Target duration: the longest entry rounded up, at least one second
    pub fn target_duration(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| e.duration.as_secs_f64().ceil() as u64)
            .max()
            .unwrap_or(1)
            .max(1)
    }

    pub fn entries(&self) -> impl Iterator<Item = &PlaylistEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the manifest text
    pub fn render(&self) -> String {
        let mut out = format!(
            "#EXTM3U\n\
             #EXT-X-VERSION:3\n\
             #EXT-X-TARGETDURATION:{}\n\
             #EXT-X-MEDIA-SEQUENCE:{}\n",
            self.target_duration(),
            self.media_sequence()
        );

        for entry in &self.entries {
            out.push_str(&format!(
                "#EXT-X-PROGRAM-DATE-TIME:{}\n#EXTINF:{:.3},\n{}\n",
                entry.program_time.to_rfc3339_opts(SecondsFormat::Millis, true),
                entry.duration.as_secs_f64(),
                entry.file_name
            ));
        }

        out
    }
}
