//! TCP endpoints: single-connection listener and resolving client.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::{TcpListener, TcpSocket, TcpStream, lookup_host};

use crate::error::{MyncError, Result};
use crate::governor::TimeoutGovernor;

/// A bound, listening TCP socket that will accept exactly one peer
#[derive(Debug)]
pub struct TcpServer {
    listener: TcpListener,
}

impl TcpServer {
    /// Bind the wildcard address on `port` with address reuse and a backlog of one
    pub fn bind(port: u16) -> Result<Self> {
        let socket = TcpSocket::new_v4().map_err(MyncError::transport("create TCP socket"))?;
        log::debug!("TCP socket created");
        socket
            .set_reuseaddr(true)
            .map_err(MyncError::transport("set TCP socket options"))?;
        socket
            .bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
            .map_err(MyncError::transport("bind TCP socket"))?;
        let listener = socket.listen(1).map_err(MyncError::transport("listen for TCP connections"))?;
        log::info!("TCP server listening on port {}", port);
        Ok(Self { listener })
    }

    /// Address actually bound (useful when `port` was 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(MyncError::transport("query TCP listener address"))
    }

    /// Block until one peer connects; the listener is closed afterwards
    pub async fn accept(self, governor: &TimeoutGovernor) -> Result<TcpStream> {
        let (stream, peer) = governor
            .guard(self.listener.accept())
            .await?
            .map_err(MyncError::transport("accept TCP connection"))?;
        log::info!("Accepted TCP connection from {}", peer);
        Ok(stream)
    }
}

/// Bind, listen and accept in one step
pub async fn serve(port: u16, governor: &TimeoutGovernor) -> Result<TcpStream> {
    TcpServer::bind(port)?.accept(governor).await
}

/// Resolve `host` and connect to the first address that accepts
pub async fn connect(host: &str, port: u16, governor: &TimeoutGovernor) -> Result<TcpStream> {
    log::info!("Setting up TCP client to connect to {}:{}", host, port);
    let addrs: Vec<SocketAddr> = governor
        .guard(lookup_host((host, port)))
        .await?
        .map_err(MyncError::transport("resolve host"))?
        .collect();

    let mut last_err = io::Error::new(
        io::ErrorKind::NotFound,
        format!("no addresses found for {}", host),
    );
    for addr in addrs {
        match governor.guard(TcpStream::connect(addr)).await? {
            Ok(stream) => {
                log::info!("Successfully connected to {}", addr);
                return Ok(stream);
            }
            Err(e) => {
                log::debug!("Connect to {} failed: {}", addr, e);
                last_err = e;
            }
        }
    }
    Err(MyncError::transport("connect to TCP server")(last_err))
}
