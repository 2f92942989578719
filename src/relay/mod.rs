//! Relay loop - readiness-driven byte copying between the configured
//! endpoints and the process's own stdin/stdout.
//!
//! Active only when no command is launched. Each iteration waits for the
//! first readable source, in fixed priority order (configured input,
//! configured output, own stdin), reads at most one buffer from it and
//! writes exactly those bytes to the route's destination.
//!
//! A zero-length read from a stream retires that route only; the loop keeps
//! servicing the rest and returns once no routes remain. Descriptors are
//! never closed here.

pub mod routing;

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::endpoint::Endpoint;
use crate::error::{MyncError, Result};
use crate::session::DescriptorPair;

pub use routing::{Role, Route, RoutingTable, Topology};

/// Largest chunk moved per readiness notification
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Counters for a finished relay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes read from each source, in source priority order
    pub from_input: u64,
    pub from_output: u64,
    pub from_stdin: u64,
    /// Number of read/write rounds
    pub chunks: u64,
}

impl RelayStats {
    pub fn total(&self) -> u64 {
        self.from_input + self.from_output + self.from_stdin
    }

    fn record(&mut self, source: Role, len: usize) {
        let len = len as u64;
        match source {
            Role::ConfiguredInput => self.from_input += len,
            Role::ConfiguredOutput => self.from_output += len,
            Role::OwnStdin | Role::OwnStdout => self.from_stdin += len,
        }
        self.chunks += 1;
    }
}

/// Topology of a descriptor pair
pub fn topology(pair: &DescriptorPair) -> Topology {
    Topology {
        input_configured: pair.input().is_some(),
        output_configured: pair.output().is_some(),
        shared: pair.is_shared(),
    }
}

/// The relay engine over one descriptor pair and a stdin/stdout stand-in
pub struct RelayLoop<'a, R, W> {
    pair: &'a DescriptorPair,
    stdin: R,
    stdout: W,
    table: RoutingTable,
    buffer_size: usize,
}

impl<'a, R, W> RelayLoop<'a, R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(pair: &'a DescriptorPair, stdin: R, stdout: W) -> Self {
        let table = RoutingTable::build(topology(pair));
        for route in table.routes() {
            log::debug!("Relay route: {}", route);
        }
        Self {
            pair,
            stdin,
            stdout,
            table,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Chunk size per read; zero is treated as one
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Relay until every route has reached end of stream.
    ///
    /// Blocks indefinitely otherwise; wrap in the timeout governor to bound it.
    pub async fn run(mut self) -> Result<RelayStats> {
        let pair = self.pair;
        let mut stats = RelayStats::default();
        let mut input_buf = vec![0u8; self.buffer_size];
        let mut output_buf = vec![0u8; self.buffer_size];
        let mut stdin_buf = vec![0u8; self.buffer_size];

        loop {
            if self.table.is_empty() {
                log::info!("All relay sources reached end of stream");
                return Ok(stats);
            }

            let watch_input = self.table.is_source(Role::ConfiguredInput);
            let watch_output = self.table.is_source(Role::ConfiguredOutput);
            let watch_stdin = self.table.is_source(Role::OwnStdin);

            let (source, read) = tokio::select! {
                biased;
                res = read_endpoint(pair.input(), &mut input_buf), if watch_input => {
                    (Role::ConfiguredInput, res)
                }
                res = read_endpoint(pair.output(), &mut output_buf), if watch_output => {
                    (Role::ConfiguredOutput, res)
                }
                res = self.stdin.read(&mut stdin_buf), if watch_stdin => (Role::OwnStdin, res),
                else => return Ok(stats),
            };
            let len = read.map_err(MyncError::io(source.read_op()))?;

            if len == 0 {
                if source_is_datagram(pair, source) {
                    log::trace!("Empty datagram from {}", source);
                    continue;
                }
                if let Some(route) = self.table.retire(source) {
                    log::info!("{} reached end of stream, route {} retired", source, route);
                }
                continue;
            }

            let chunk: &[u8] = match source {
                Role::ConfiguredInput => &input_buf[..len],
                Role::ConfiguredOutput => &output_buf[..len],
                Role::OwnStdin | Role::OwnStdout => &stdin_buf[..len],
            };
            let Some(dest) = self.table.dest_for(source) else {
                continue;
            };
            log::trace!("{} bytes {} -> {}", len, source, dest);

            let written = match dest {
                Role::ConfiguredInput => write_endpoint(pair.input(), chunk).await,
                Role::ConfiguredOutput => write_endpoint(pair.output(), chunk).await,
                Role::OwnStdout => write_stream(&mut self.stdout, chunk).await,
                Role::OwnStdin => Err(io::Error::new(io::ErrorKind::Unsupported, "stdin is not writable")),
            };
            written.map_err(MyncError::io(dest.write_op()))?;

            stats.record(source, len);
        }
    }
}

fn source_is_datagram(pair: &DescriptorPair, source: Role) -> bool {
    let endpoint = match source {
        Role::ConfiguredInput => pair.input(),
        Role::ConfiguredOutput => pair.output(),
        Role::OwnStdin | Role::OwnStdout => None,
    };
    endpoint.is_some_and(Endpoint::is_datagram)
}

async fn read_endpoint(endpoint: Option<&Endpoint>, buf: &mut [u8]) -> io::Result<usize> {
    match endpoint {
        Some(endpoint) => endpoint.read(buf).await,
        None => std::future::pending().await,
    }
}

async fn write_endpoint(endpoint: Option<&Endpoint>, buf: &[u8]) -> io::Result<()> {
    match endpoint {
        Some(endpoint) => endpoint.write_all(buf).await,
        None => Err(io::ErrorKind::NotConnected.into()),
    }
}

async fn write_stream<W: AsyncWrite + Unpin>(writer: &mut W, buf: &[u8]) -> io::Result<()> {
    writer.write_all(buf).await?;
    writer.flush().await
}
