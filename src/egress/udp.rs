//! UDP relay sink
//!
//! Re-emits segment payloads as datagrams. No acknowledgement and no retry:
//! the relay keeps UDP's at-most-once semantics end to end, with datagrams
//! leaving in release order.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;

use super::error::SinkError;
use super::SegmentSink;
use crate::buffer::Segment;

/// Default datagram payload: 7 transport-stream packets
pub const DEFAULT_UDP_PAYLOAD_SIZE: usize = 7 * 188;

/// Sends released segments to a UDP address
#[derive(Debug)]
pub struct UdpSink {
    target: SocketAddr,
    payload_size: usize,
    multicast_ttl: u32,
    socket: Option<UdpSocket>,
}

impl UdpSink {
    pub fn new(target: SocketAddr, payload_size: usize, multicast_ttl: u32) -> Self {
        Self {
            target,
            payload_size: payload_size.max(1),
            multicast_ttl,
            socket: None,
        }
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl SegmentSink for UdpSink {
    async fn open(&mut self) -> Result<(), SinkError> {
        let local: SocketAddr = if self.target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let setup = |source| SinkError::Setup {
            target: self.target.to_string(),
            source,
        };

        let socket = UdpSocket::bind(local).await.map_err(setup)?;
        if self.target.ip().is_multicast() && self.target.is_ipv4() {
            socket
                .set_multicast_ttl_v4(self.multicast_ttl)
                .map_err(setup)?;
        }

        tracing::info!(target = %self.target, "UDP sink ready");
        self.socket = Some(socket);
        Ok(())
    }

    async fn deliver(&mut self, segment: &Segment) -> Result<(), SinkError> {
        let socket = self.socket.as_ref().ok_or(SinkError::NotOpen)?;

        for chunk in segment.payload.chunks(self.payload_size) {
            socket
                .send_to(chunk, self.target)
                .await
                .map_err(SinkError::Send)?;
        }

        Ok(())
    }
}
