//! Endpoints - configured transport attachment points
//!
//! This module provides:
//! - Mode tag parsing into [`EndpointSpec`]
//! - One constructor per transport variant (TCP, UDP, Unix stream, Unix datagram)
//! - [`Endpoint`], the owned, ready-to-use socket handed to the relay or launcher

pub mod spec;
pub mod tcp;
pub mod udp;
pub mod unix;

use std::io;
use std::os::fd::OwnedFd;

use tokio::net::{TcpStream, UdpSocket, UnixDatagram, UnixStream};

use crate::error::Result;
use crate::governor::TimeoutGovernor;

pub use spec::{EndpointKind, EndpointSpec, Side};

/// Settings shared by every constructor
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Deadline armed after a UDP server handshake (0 = none)
    pub udp_timeout_secs: u64,
    /// Acknowledgement a UDP server sends to its peer
    pub ack: [u8; 3],
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            udp_timeout_secs: 0,
            ack: udp::DEFAULT_ACK,
        }
    }
}

/// A connected socket owning exactly one descriptor
#[derive(Debug)]
pub enum Endpoint {
    Tcp(TcpStream),
    Udp(UdpSocket),
    UnixStream(UnixStream),
    UnixDatagram(UnixDatagram),
}

impl Endpoint {
    /// Construct the endpoint described by `spec`. Failure leaves nothing open.
    pub async fn open(spec: &EndpointSpec, governor: &TimeoutGovernor, options: &OpenOptions) -> Result<Self> {
        log::debug!("Opening endpoint {}", spec);
        let endpoint = match spec {
            EndpointSpec::TcpServer { port } => Endpoint::Tcp(tcp::serve(*port, governor).await?),
            EndpointSpec::TcpClient { host, port } => Endpoint::Tcp(tcp::connect(host, *port, governor).await?),
            EndpointSpec::UdpServer { port } => Endpoint::Udp(
                udp::serve(*port, options.udp_timeout_secs, &options.ack, governor).await?,
            ),
            EndpointSpec::UdpClient { addr, port } => Endpoint::Udp(udp::connect(*addr, *port).await?),
            EndpointSpec::UnixStreamServer { path } => {
                Endpoint::UnixStream(unix::serve_stream(path, governor).await?)
            }
            EndpointSpec::UnixStreamClient { path } => {
                Endpoint::UnixStream(unix::connect_stream(path, governor).await?)
            }
            EndpointSpec::UnixDatagramServer { path } => Endpoint::UnixDatagram(unix::bind_datagram(path)?),
            EndpointSpec::UnixDatagramClient { path } => Endpoint::UnixDatagram(unix::connect_datagram(path)?),
        };
        Ok(endpoint)
    }

    /// Short transport name for log lines
    pub fn transport(&self) -> &'static str {
        match self {
            Endpoint::Tcp(_) => "tcp",
            Endpoint::Udp(_) => "udp",
            Endpoint::UnixStream(_) => "unix-stream",
            Endpoint::UnixDatagram(_) => "unix-datagram",
        }
    }

    /// Whether reads return whole messages rather than a byte stream
    pub fn is_datagram(&self) -> bool {
        matches!(self, Endpoint::Udp(_) | Endpoint::UnixDatagram(_))
    }

    /// Wait for readiness and read at most `buf.len()` bytes.
    ///
    /// Cancel safe: dropping the future before it resolves loses no data.
    pub async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Endpoint::Tcp(stream) => loop {
                stream.readable().await?;
                match stream.try_read(buf) {
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                    other => return other,
                }
            },
            Endpoint::UnixStream(stream) => loop {
                stream.readable().await?;
                match stream.try_read(buf) {
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                    other => return other,
                }
            },
            Endpoint::Udp(socket) => socket.recv(buf).await,
            Endpoint::UnixDatagram(socket) => socket.recv(buf).await,
        }
    }

    /// Write all of `buf` (one datagram for message-oriented endpoints)
    pub async fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        match self {
            Endpoint::Tcp(stream) => {
                let mut written = 0;
                while written < buf.len() {
                    stream.writable().await?;
                    match stream.try_write(&buf[written..]) {
                        Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                        Ok(n) => written += n,
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                        Err(e) => return Err(e),
                    }
                }
                Ok(())
            }
            Endpoint::UnixStream(stream) => {
                let mut written = 0;
                while written < buf.len() {
                    stream.writable().await?;
                    match stream.try_write(&buf[written..]) {
                        Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                        Ok(n) => written += n,
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                        Err(e) => return Err(e),
                    }
                }
                Ok(())
            }
            Endpoint::Udp(socket) => socket.send(buf).await.map(|_| ()),
            Endpoint::UnixDatagram(socket) => socket.send(buf).await.map(|_| ()),
        }
    }

    /// Give up the tokio registration and return a blocking descriptor for a child's stdio
    pub fn into_owned_fd(self) -> io::Result<OwnedFd> {
        let fd = match self {
            Endpoint::Tcp(stream) => {
                let stream = stream.into_std()?;
                stream.set_nonblocking(false)?;
                OwnedFd::from(stream)
            }
            Endpoint::Udp(socket) => {
                let socket = socket.into_std()?;
                socket.set_nonblocking(false)?;
                OwnedFd::from(socket)
            }
            Endpoint::UnixStream(stream) => {
                let stream = stream.into_std()?;
                stream.set_nonblocking(false)?;
                OwnedFd::from(stream)
            }
            Endpoint::UnixDatagram(socket) => {
                let socket = socket.into_std()?;
                socket.set_nonblocking(false)?;
                OwnedFd::from(socket)
            }
        };
        Ok(fd)
    }
}
