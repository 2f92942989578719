//! Mode tag parsing.
//!
//! A mode string is a literal tag followed by its arguments, e.g.
//! `TCPS4050`, `TCPClocalhost,4050`, `UDSSS/tmp/relay.sock`. Parsing is pure:
//! nothing is opened here, so a malformed tag fails before any socket exists.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::error::{MyncError, Result};

/// Transport variant named by a mode tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    TcpServer,
    TcpClient,
    UdpServer,
    UdpClient,
    UnixStreamServer,
    UnixStreamClient,
    UnixDatagramServer,
    UnixDatagramClient,
}

impl EndpointKind {
    /// Every kind, in tag-matching order
    pub const ALL: [EndpointKind; 8] = [
        EndpointKind::UnixStreamServer,
        EndpointKind::UnixStreamClient,
        EndpointKind::UnixDatagramServer,
        EndpointKind::UnixDatagramClient,
        EndpointKind::TcpServer,
        EndpointKind::TcpClient,
        EndpointKind::UdpServer,
        EndpointKind::UdpClient,
    ];

    /// Literal prefix for this kind
    pub fn tag(&self) -> &'static str {
        match self {
            EndpointKind::TcpServer => "TCPS",
            EndpointKind::TcpClient => "TCPC",
            EndpointKind::UdpServer => "UDPS",
            EndpointKind::UdpClient => "UDPC",
            EndpointKind::UnixStreamServer => "UDSSS",
            EndpointKind::UnixStreamClient => "UDSCS",
            EndpointKind::UnixDatagramServer => "UDSSD",
            EndpointKind::UnixDatagramClient => "UDSCD",
        }
    }

    /// Whether this kind waits for a peer rather than dialing one
    pub fn is_server(&self) -> bool {
        matches!(
            self,
            EndpointKind::TcpServer
                | EndpointKind::UdpServer
                | EndpointKind::UnixStreamServer
                | EndpointKind::UnixDatagramServer
        )
    }

    /// Whether this kind is message-oriented
    pub fn is_datagram(&self) -> bool {
        matches!(
            self,
            EndpointKind::UdpServer
                | EndpointKind::UdpClient
                | EndpointKind::UnixDatagramServer
                | EndpointKind::UnixDatagramClient
        )
    }

    /// Whether the kind may be configured on `side`
    pub fn allowed_on(&self, side: Side) -> bool {
        match side {
            Side::Input => self.is_server(),
            Side::Output => true,
            Side::Both => matches!(
                self,
                EndpointKind::TcpServer
                    | EndpointKind::UdpServer
                    | EndpointKind::UnixStreamServer
                    | EndpointKind::UnixStreamClient
            ),
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Which role a mode string was given for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Input,
    Output,
    Both,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Input => f.write_str("input"),
            Side::Output => f.write_str("output"),
            Side::Both => f.write_str("bidirectional"),
        }
    }
}

/// A validated mode tag with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointSpec {
    TcpServer { port: u16 },
    TcpClient { host: String, port: u16 },
    UdpServer { port: u16 },
    UdpClient { addr: IpAddr, port: u16 },
    UnixStreamServer { path: PathBuf },
    UnixStreamClient { path: PathBuf },
    UnixDatagramServer { path: PathBuf },
    UnixDatagramClient { path: PathBuf },
}

impl EndpointSpec {
    /// Parse a mode string without regard to the side it is used on
    pub fn parse(mode: &str) -> Result<Self> {
        let kind = EndpointKind::ALL
            .into_iter()
            .find(|kind| mode.starts_with(kind.tag()))
            .ok_or_else(|| MyncError::config(format!("unknown mode tag: '{}'", mode)))?;
        let rest = &mode[kind.tag().len()..];

        let spec = match kind {
            EndpointKind::TcpServer => EndpointSpec::TcpServer {
                port: parse_port(kind, rest)?,
            },
            EndpointKind::UdpServer => EndpointSpec::UdpServer {
                port: parse_port(kind, rest)?,
            },
            EndpointKind::TcpClient => {
                let (host, port) = split_host_port(kind, rest)?;
                let host = if host == "localhost" {
                    Ipv4Addr::LOCALHOST.to_string()
                } else {
                    host.to_string()
                };
                EndpointSpec::TcpClient { host, port }
            }
            EndpointKind::UdpClient => {
                let (host, port) = split_host_port(kind, rest)?;
                let addr = if host == "localhost" {
                    IpAddr::V4(Ipv4Addr::LOCALHOST)
                } else {
                    host.parse::<IpAddr>().map_err(|_| {
                        MyncError::config(format!("{} host must be an IP address, got '{}'", kind, host))
                    })?
                };
                EndpointSpec::UdpClient { addr, port }
            }
            EndpointKind::UnixStreamServer => EndpointSpec::UnixStreamServer {
                path: parse_path(kind, rest)?,
            },
            EndpointKind::UnixStreamClient => EndpointSpec::UnixStreamClient {
                path: parse_path(kind, rest)?,
            },
            EndpointKind::UnixDatagramServer => EndpointSpec::UnixDatagramServer {
                path: parse_path(kind, rest)?,
            },
            EndpointKind::UnixDatagramClient => EndpointSpec::UnixDatagramClient {
                path: parse_path(kind, rest)?,
            },
        };
        Ok(spec)
    }

    /// Parse a mode string and check it is usable on `side`
    pub fn parse_for(mode: &str, side: Side) -> Result<Self> {
        let spec = Self::parse(mode)?;
        if !spec.kind().allowed_on(side) {
            return Err(MyncError::config(format!(
                "{} mode cannot be used as {}",
                spec.kind(),
                side
            )));
        }
        Ok(spec)
    }

    /// Transport variant of this spec
    pub fn kind(&self) -> EndpointKind {
        match self {
            EndpointSpec::TcpServer { .. } => EndpointKind::TcpServer,
            EndpointSpec::TcpClient { .. } => EndpointKind::TcpClient,
            EndpointSpec::UdpServer { .. } => EndpointKind::UdpServer,
            EndpointSpec::UdpClient { .. } => EndpointKind::UdpClient,
            EndpointSpec::UnixStreamServer { .. } => EndpointKind::UnixStreamServer,
            EndpointSpec::UnixStreamClient { .. } => EndpointKind::UnixStreamClient,
            EndpointSpec::UnixDatagramServer { .. } => EndpointKind::UnixDatagramServer,
            EndpointSpec::UnixDatagramClient { .. } => EndpointKind::UnixDatagramClient,
        }
    }
}

impl fmt::Display for EndpointSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.kind().tag();
        match self {
            EndpointSpec::TcpServer { port } | EndpointSpec::UdpServer { port } => {
                write!(f, "{}{}", tag, port)
            }
            EndpointSpec::TcpClient { host, port } => write!(f, "{}{},{}", tag, host, port),
            EndpointSpec::UdpClient { addr, port } => write!(f, "{}{},{}", tag, addr, port),
            EndpointSpec::UnixStreamServer { path }
            | EndpointSpec::UnixStreamClient { path }
            | EndpointSpec::UnixDatagramServer { path }
            | EndpointSpec::UnixDatagramClient { path } => write!(f, "{}{}", tag, path.display()),
        }
    }
}

fn parse_port(kind: EndpointKind, raw: &str) -> Result<u16> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(MyncError::config(format!("{} mode is missing a port", kind)));
    }
    raw.parse::<u16>()
        .map_err(|_| MyncError::config(format!("invalid port '{}' in {} mode", raw, kind)))
}

fn split_host_port(kind: EndpointKind, raw: &str) -> Result<(&str, u16)> {
    let (host, port) = raw
        .split_once(',')
        .ok_or_else(|| MyncError::config(format!("{} mode is missing a port", kind)))?;
    let host = host.trim();
    if host.is_empty() {
        return Err(MyncError::config(format!("{} mode is missing a host", kind)));
    }
    let port = parse_port(kind, port)?;
    if port == 0 {
        return Err(MyncError::config(format!("{} mode needs a non-zero port", kind)));
    }
    Ok((host, port))
}

fn parse_path(kind: EndpointKind, raw: &str) -> Result<PathBuf> {
    if raw.is_empty() {
        return Err(MyncError::config(format!("{} mode is missing a socket path", kind)));
    }
    Ok(PathBuf::from(raw))
}
