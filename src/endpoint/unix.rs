//! Unix domain socket endpoints (stream and datagram).
//!
//! Server variants unlink whatever sits at the socket path before binding,
//! so a second run against the same path needs no manual cleanup.

use std::io;
use std::path::Path;

use tokio::net::{UnixDatagram, UnixListener, UnixStream};

use crate::error::{MyncError, Result};
use crate::governor::TimeoutGovernor;

/// Remove a leftover socket file at `path`, if any
pub fn remove_stale_socket(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            log::debug!("Removed stale socket file {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MyncError::transport("remove stale socket file")(e)),
    }
}

/// A listening stream socket that will accept exactly one peer
#[derive(Debug)]
pub struct UnixStreamServer {
    listener: UnixListener,
}

impl UnixStreamServer {
    pub fn bind(path: &Path) -> Result<Self> {
        remove_stale_socket(path)?;
        let listener = UnixListener::bind(path).map_err(MyncError::transport("bind Unix stream socket"))?;
        log::info!("Unix domain stream server started on {}", path.display());
        Ok(Self { listener })
    }

    pub async fn accept(self, governor: &TimeoutGovernor) -> Result<UnixStream> {
        let (stream, _addr) = governor
            .guard(self.listener.accept())
            .await?
            .map_err(MyncError::transport("accept Unix stream connection"))?;
        log::info!("Accepted Unix stream connection");
        Ok(stream)
    }
}

pub async fn serve_stream(path: &Path, governor: &TimeoutGovernor) -> Result<UnixStream> {
    UnixStreamServer::bind(path)?.accept(governor).await
}

pub async fn connect_stream(path: &Path, governor: &TimeoutGovernor) -> Result<UnixStream> {
    log::info!("Connecting to Unix domain stream server at {}", path.display());
    let stream = governor
        .guard(UnixStream::connect(path))
        .await?
        .map_err(MyncError::transport("connect Unix stream socket"))?;
    log::info!("Connected to Unix domain stream server at {}", path.display());
    Ok(stream)
}

/// Bind a datagram socket at `path`. No handshake: readers take datagrams from any sender.
pub fn bind_datagram(path: &Path) -> Result<UnixDatagram> {
    remove_stale_socket(path)?;
    let socket = UnixDatagram::bind(path).map_err(MyncError::transport("bind Unix datagram socket"))?;
    log::info!("Unix domain datagram server started on {}", path.display());
    Ok(socket)
}

pub fn connect_datagram(path: &Path) -> Result<UnixDatagram> {
    let socket = UnixDatagram::unbound().map_err(MyncError::transport("create Unix datagram socket"))?;
    socket
        .connect(path)
        .map_err(MyncError::transport("connect Unix datagram socket"))?;
    log::info!("Connected to Unix domain datagram server at {}", path.display());
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_remove_stale_socket_missing_file() {
        let dir = tempdir().unwrap();
        assert!(remove_stale_socket(&dir.path().join("absent.sock")).is_ok());
    }

    #[tokio::test]
    async fn test_stream_server_rebinds_stale_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stream.sock");

        let first = UnixStreamServer::bind(&path).unwrap();
        drop(first);
        assert!(path.exists());

        let second = UnixStreamServer::bind(&path);
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_stream_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rt.sock");
        let governor = TimeoutGovernor::with_timeout(5);

        let server = UnixStreamServer::bind(&path).unwrap();
        let (accepted, client) = tokio::join!(server.accept(&governor), connect_stream(&path, &governor));
        let mut accepted = accepted.unwrap();
        let mut client = client.unwrap();

        client.write_all(b"over unix").await.unwrap();
        let mut buf = [0u8; 9];
        accepted.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"over unix");
    }

    #[tokio::test]
    async fn test_datagram_server_receives_from_client() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dgram.sock");

        let server = bind_datagram(&path).unwrap();
        let client = connect_datagram(&path).unwrap();
        client.send(b"datagram").await.unwrap();

        let mut buf = [0u8; 32];
        let n = server.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"datagram");

        // Second bind against the same path succeeds
        drop(server);
        assert!(bind_datagram(&path).is_ok());
    }

    #[tokio::test]
    async fn test_connect_missing_path_fails() {
        let dir = tempdir().unwrap();
        let governor = TimeoutGovernor::new();
        let err = connect_stream(&dir.path().join("nobody.sock"), &governor)
            .await
            .unwrap_err();
        assert!(matches!(err, MyncError::Transport { .. }));
        assert!(connect_datagram(&dir.path().join("nobody.sock")).is_err());
    }
}
