//! UDP (multicast) capture
//!
//! Binds the source port, joins the multicast group if the source address is
//! one, and cuts the received datagrams into fixed-duration segments.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::Instant;

use super::accumulator::SegmentAccumulator;
use super::error::CaptureError;
use super::writer::SegmentWriter;
use crate::buffer::SegmentStore;
use crate::pipeline::PipelineContext;

/// Capture loop for a UDP source
#[derive(Debug)]
pub struct UdpCapture {
    socket: UdpSocket,
    source: SocketAddr,
    recv_buffer_size: usize,
    segment_duration: Duration,
}

impl UdpCapture {
    /// Bind the source socket
    ///
    /// For a multicast address the socket binds the wildcard address on the
    /// same port with address reuse enabled, so several streams can capture
    /// one group, and joins the group on the default interface. Any other
    /// address is bound as given.
    pub async fn bind(
        source: SocketAddr,
        segment_duration: Duration,
        recv_buffer_size: usize,
    ) -> Result<Self, CaptureError> {
        let multicast = source.ip().is_multicast();
        let bind_addr = match source.ip() {
            IpAddr::V4(_) if multicast => SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), source.port()),
            IpAddr::V6(_) if multicast => SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), source.port()),
            _ => source,
        };

        let socket = open_socket(bind_addr, multicast).map_err(CaptureError::Bind)?;

        match source.ip() {
            IpAddr::V4(group) if group.is_multicast() => socket
                .join_multicast_v4(group, Ipv4Addr::UNSPECIFIED)
                .map_err(CaptureError::Bind)?,
            IpAddr::V6(group) if group.is_multicast() => socket
                .join_multicast_v6(&group, 0)
                .map_err(CaptureError::Bind)?,
            _ => {}
        }

        tracing::info!(source = %source, bind = %bind_addr, "UDP source bound");

        Ok(Self {
            socket,
            source,
            recv_buffer_size: recv_buffer_size.max(1),
            segment_duration,
        })
    }

    /// Address actually bound (useful when binding port 0)
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive until cancelled or the socket fails
    ///
    /// A segment still accumulating when the loop exits is discarded.
    pub async fn run<S: SegmentStore>(self, mut writer: SegmentWriter<S>) -> Result<(), CaptureError> {
        let ctx: PipelineContext = writer.context().clone();
        let mut accumulator = SegmentAccumulator::with_capacity(self.segment_duration, self.recv_buffer_size);
        let mut buf = vec![0u8; self.recv_buffer_size];

        let result = loop {
            let received = tokio::select! {
                _ = ctx.cancel.cancelled() => break Ok(()),
                received = self.socket.recv_from(&mut buf) => received,
            };

            let len = match received {
                Ok((len, _peer)) => len,
                Err(e) => break Err(CaptureError::Recv(e)),
            };

            ctx.mark_running();

            if let Some(flushed) = accumulator.push(&buf[..len], Instant::now()) {
                if let Err(e) = writer.write(flushed.payload, flushed.duration).await {
                    break Err(e.into());
                }
            }
        };

        let dropped = accumulator.discard();
        tracing::info!(
            stream = %ctx.stream_id,
            source = %self.source,
            discarded_bytes = dropped,
            segments = writer.next_sequence(),
            "UDP capture stopped"
        );

        result
    }
}

/// Create a non-blocking UDP socket bound to `addr`
fn open_socket(addr: SocketAddr, reuse: bool) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    if reuse {
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    UdpSocket::from_std(socket.into())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::buffer::{MemoryStore, StreamId};
    use crate::session::StreamState;

    #[tokio::test]
    async fn test_capture_flushes_segments() {
        let store = Arc::new(MemoryStore::new());
        let ctx = PipelineContext::new(StreamId::new("udp"));
        let capture = UdpCapture::bind(
            "127.0.0.1:0".parse().unwrap(),
            Duration::from_millis(50),
            2048,
        )
        .await
        .unwrap();
        let addr = capture.local_addr().unwrap();

        let writer = SegmentWriter::new(Arc::clone(&store), ctx.clone());
        let task = tokio::spawn(capture.run(writer));

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        for _ in 0..20 {
            sender.send_to(&[0x47; 188], addr).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        ctx.cancel.cancel();
        task.await.unwrap().unwrap();

        assert_eq!(ctx.state(), StreamState::Running);
        let captured = store.len(&ctx.stream_id).await;
        assert!(captured >= 1, "expected at least one segment, got {}", captured);

        // Sequences are contiguous from 0
        let mut next = 0;
        while let Some(segment) = store
            .peek_oldest_at_or_before(&ctx.stream_id, Instant::now())
            .await
        {
            assert_eq!(segment.sequence, next);
            assert_eq!(segment.payload.len() % 188, 0);
            store.remove(&ctx.stream_id, segment.sequence).await;
            next += 1;
        }
        assert_eq!(next as usize, captured);
    }

    #[tokio::test]
    async fn test_cancel_unblocks_idle_capture() {
        let store = Arc::new(MemoryStore::new());
        let ctx = PipelineContext::new(StreamId::new("idle"));
        let capture = UdpCapture::bind(
            "127.0.0.1:0".parse().unwrap(),
            Duration::from_secs(1),
            2048,
        )
        .await
        .unwrap();

        let task = tokio::spawn(capture.run(SegmentWriter::new(store, ctx.clone())));
        ctx.cancel.cancel();

        // No traffic ever arrives; cancellation alone must end the loop
        let result = tokio::time::timeout(Duration::from_secs(1), task).await;
        assert!(result.is_ok());
        assert_eq!(ctx.state(), StreamState::Starting);
    }

    #[tokio::test]
    async fn test_multicast_group_shared() {
        let port = UdpSocket::bind("0.0.0.0:0").await.unwrap().local_addr().unwrap().port();
        let group: SocketAddr = format!("239.255.10.20:{}", port).parse().unwrap();

        let first = UdpCapture::bind(group, Duration::from_secs(1), 2048).await.unwrap();
        let second = UdpCapture::bind(group, Duration::from_secs(1), 2048).await.unwrap();

        assert_eq!(first.local_addr().unwrap().port(), port);
        assert_eq!(second.local_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn test_partial_segment_discarded() {
        let store = Arc::new(MemoryStore::new());
        let ctx = PipelineContext::new(StreamId::new("partial"));
        let capture = UdpCapture::bind(
            "127.0.0.1:0".parse().unwrap(),
            Duration::from_secs(60),
            2048,
        )
        .await
        .unwrap();
        let addr = capture.local_addr().unwrap();
        let task = tokio::spawn(capture.run(SegmentWriter::new(Arc::clone(&store), ctx.clone())));

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&[0x47; 188], addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        ctx.cancel.cancel();
        task.await.unwrap().unwrap();

        assert_eq!(store.len(&ctx.stream_id).await, 0);
    }
}
