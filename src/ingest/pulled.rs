//! Pulled HLS capture
//!
//! Polls an upstream media playlist and fetches each new segment in order.
//! Upstream segments are already duration-bounded, so each one becomes a
//! buffer segment as-is, stamped with the instant it was fetched.
//!
//! ```text
//!   poll playlist ──► media sequence > last taken? ──► GET segment ──► put()
//!        ▲                                                              │
//!        └───────────────────────── sleep(interval) ◄───────────────────┘
//! ```

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, Url};

use super::error::CaptureError;
use super::writer::SegmentWriter;
use crate::buffer::SegmentStore;
use crate::pipeline::PipelineContext;

/// An upstream segment selected for download
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamSegment {
    /// Upstream media sequence number
    pub media_sequence: u64,
    /// Absolute segment URL
    pub url: Url,
    /// `#EXTINF` duration
    pub duration: Duration,
}

/// Capture loop for a pulled HLS source
pub struct PulledCapture {
    client: Client,
    playlist_url: Url,
    poll_interval: Duration,
    fallback_duration: Duration,
    max_failures: u32,
    last_media_sequence: Option<u64>,
}

impl PulledCapture {
    pub fn new(
        client: Client,
        playlist_url: Url,
        poll_interval: Duration,
        fallback_duration: Duration,
        max_failures: u32,
    ) -> Self {
        Self {
            client,
            playlist_url,
            poll_interval,
            fallback_duration,
            max_failures: max_failures.max(1),
            last_media_sequence: None,
        }
    }

    /// Poll until cancelled or the source stays unavailable
    pub async fn run<S: SegmentStore>(mut self, mut writer: SegmentWriter<S>) -> Result<(), CaptureError> {
        let ctx: PipelineContext = writer.context().clone();
        let mut failures = 0u32;

        let result = loop {
            let polled = tokio::select! {
                _ = ctx.cancel.cancelled() => break Ok(()),
                polled = self.poll_once(&mut writer) => polled,
            };

            match polled {
                Ok(_) => {
                    failures = 0;
                    ctx.mark_running();
                }
                Err(e) if e.is_retryable() => {
                    failures += 1;
                    tracing::warn!(
                        stream = %ctx.stream_id,
                        url = %self.playlist_url,
                        attempt = failures,
                        error = %e,
                        "Source poll failed"
                    );
                    if failures >= self.max_failures {
                        break Err(CaptureError::SourceUnavailable { attempts: failures });
                    }
                }
                Err(e) => break Err(e),
            }

            tokio::select! {
                _ = ctx.cancel.cancelled() => break Ok(()),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        };

        tracing::info!(
            stream = %ctx.stream_id,
            url = %self.playlist_url,
            segments = writer.next_sequence(),
            "Pulled capture stopped"
        );

        result
    }

    /// Fetch the playlist and buffer every segment not taken yet
    ///
    /// Returns the number of segments buffered.
    async fn poll_once<S: SegmentStore>(
        &mut self,
        writer: &mut SegmentWriter<S>,
    ) -> Result<usize, CaptureError> {
        let body = self.fetch(self.playlist_url.clone()).await?;
        let pending = self.select_new(&body)?;

        let mut taken = 0;
        for upstream in pending {
            let payload = self.fetch(upstream.url.clone()).await?;
            writer.write(payload, upstream.duration).await?;
            self.last_media_sequence = Some(upstream.media_sequence);
            taken += 1;
        }

        Ok(taken)
    }

    async fn fetch(&self, url: Url) -> Result<Bytes, CaptureError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }

    /// Pick the segments of `body` newer than the last one taken
    ///
    /// The first poll joins at the live edge and takes only the newest
    /// segment. If upstream media sequence numbers went backwards (encoder
    /// restart), the newest segment is taken and tracking restarts from it.
    fn select_new(&self, body: &[u8]) -> Result<Vec<UpstreamSegment>, CaptureError> {
        let playlist = m3u8_rs::parse_media_playlist_res(body)
            .map_err(|e| CaptureError::Playlist(format!("{:?}", e)))?;

        let mut segments = Vec::with_capacity(playlist.segments.len());
        for (index, segment) in playlist.segments.iter().enumerate() {
            let url = self
                .playlist_url
                .join(&segment.uri)
                .map_err(|_| CaptureError::SegmentUri(segment.uri.clone()))?;
            let duration = Duration::try_from_secs_f32(segment.duration)
                .ok()
                .filter(|d| !d.is_zero())
                .unwrap_or(self.fallback_duration);

            let media_sequence = playlist
                .media_sequence
                .checked_add(index as u64)
                .ok_or_else(|| {
                    CaptureError::Playlist(format!(
                        "media sequence {} overflows at segment {}",
                        playlist.media_sequence, index
                    ))
                })?;

            segments.push(UpstreamSegment {
                media_sequence,
                url,
                duration,
            });
        }

        let newest = match segments.last() {
            Some(segment) => segment.media_sequence,
            None => return Ok(Vec::new()),
        };

        match self.last_media_sequence {
            Some(last) if newest >= last => {
                segments.retain(|s| s.media_sequence > last);
            }
            Some(last) => {
                tracing::warn!(
                    url = %self.playlist_url,
                    last = last,
                    newest = newest,
                    "Upstream media sequence went backwards, rejoining at live edge"
                );
                segments.drain(..segments.len() - 1);
            }
            None => {
                segments.drain(..segments.len() - 1);
            }
        }

        Ok(segments)
    }
}

impl std::fmt::Debug for PulledCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulledCapture")
            .field("playlist_url", &self.playlist_url.as_str())
            .field("poll_interval", &self.poll_interval)
            .field("last_media_sequence", &self.last_media_sequence)
            .finish()
    }
}
