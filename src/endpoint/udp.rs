//! UDP endpoints.
//!
//! The server learns its peer from the first datagram, pins the socket to
//! that peer and answers with a three byte acknowledgement. The client just
//! connects; there is no client-side handshake.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;

use crate::error::{MyncError, Result};
use crate::governor::TimeoutGovernor;

/// Default acknowledgement sent by the server after the first datagram
pub const DEFAULT_ACK: [u8; 3] = *b"ACK";

/// Size of the buffer used to receive the handshake datagram
const HANDSHAKE_BUFFER: usize = 1024;

/// A bound UDP socket still waiting for its first datagram
#[derive(Debug)]
pub struct UdpServer {
    socket: UdpSocket,
}

impl UdpServer {
    /// Bind the wildcard address on `port`
    pub async fn bind(port: u16) -> Result<Self> {
        let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
            .await
            .map_err(MyncError::transport("bind UDP socket"))?;
        log::info!("UDP server bound on port {}", port);
        Ok(Self { socket })
    }

    /// Address actually bound (useful when `port` was 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(MyncError::transport("query UDP socket address"))
    }

    /// Wait for the first datagram, pin the socket to its sender and acknowledge it.
    ///
    /// The handshake datagram's payload is discarded.
    pub async fn handshake(self, governor: &TimeoutGovernor, ack: &[u8]) -> Result<(UdpSocket, SocketAddr)> {
        let mut buf = [0u8; HANDSHAKE_BUFFER];
        let (len, peer) = governor
            .guard(self.socket.recv_from(&mut buf))
            .await?
            .map_err(MyncError::transport("receive UDP handshake"))?;
        log::info!("Received {} byte handshake datagram from {}", len, peer);

        self.socket
            .connect(peer)
            .await
            .map_err(MyncError::transport("connect UDP socket to peer"))?;
        self.socket
            .send(ack)
            .await
            .map_err(MyncError::transport("send UDP acknowledgement"))?;
        log::debug!("Acknowledged UDP peer {}", peer);
        Ok((self.socket, peer))
    }

    /// Handshake, then re-arm the governor with `timeout_secs` (0 disarms it)
    pub async fn establish(self, governor: &TimeoutGovernor, ack: &[u8], timeout_secs: u64) -> Result<UdpSocket> {
        let (socket, _peer) = self.handshake(governor, ack).await?;
        governor.arm(timeout_secs);
        Ok(socket)
    }
}

pub async fn serve(port: u16, timeout_secs: u64, ack: &[u8], governor: &TimeoutGovernor) -> Result<UdpSocket> {
    UdpServer::bind(port).await?.establish(governor, ack, timeout_secs).await
}

/// Open a datagram socket connected to `addr:port`
pub async fn connect(addr: IpAddr, port: u16) -> Result<UdpSocket> {
    let local = match addr {
        IpAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        IpAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    };
    let socket = UdpSocket::bind(local)
        .await
        .map_err(MyncError::transport("create UDP socket"))?;
    socket
        .connect(SocketAddr::new(addr, port))
        .await
        .map_err(MyncError::transport("connect UDP socket"))?;
    log::info!("UDP client connected to {}:{}", addr, port);
    Ok(socket)
}
