use std::future::Future;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;
use tracing::info;

use crate::error::{Result, TransportError};

/// The send half of a connected datagram transport.
pub trait DatagramSink: Send + Sync {
    /// Submit `buf` as one datagram. Returns how many bytes were accepted.
    fn send(&self, buf: &[u8]) -> impl Future<Output = std::io::Result<usize>> + Send;
}

impl DatagramSink for UdpSocket {
    async fn send(&self, buf: &[u8]) -> std::io::Result<usize> {
        UdpSocket::send(self, buf).await
    }
}

/// Bind an ephemeral local socket and connect it to the collector.
pub async fn connect_collector(addr: SocketAddr) -> Result<UdpSocket> {
    let local: SocketAddr = if addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let socket = UdpSocket::bind(local)
        .await
        .map_err(|source| TransportError::Bind {
            addr: local,
            source,
        })?;
    socket
        .connect(addr)
        .await
        .map_err(|source| TransportError::Connect { addr, source })?;

    info!(%addr, "connected collector socket");
    Ok(socket)
}
