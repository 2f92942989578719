//! Error types for mync
//!
//! Centralized error handling using thiserror. Each variant maps onto one
//! failure class: configuration, transport setup, relay I/O, or deadline
//! expiry.

use thiserror::Error;

/// All error types that can occur in mync
#[derive(Debug, Error)]
pub enum MyncError {
    /// Malformed mode tag, missing host/port/path, bad config file value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Socket, bind, listen, connect, accept or resolution failure
    #[error("Transport error during {op}: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Read, write or descriptor duplication failure
    #[error("IO error during {op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The timeout governor's deadline expired
    #[error("Deadline expired")]
    TimedOut,
}

impl MyncError {
    /// Build a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Adapter for `map_err` on transport setup calls
    pub fn transport(op: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Transport { op, source }
    }

    /// Adapter for `map_err` on relay and redirection calls
    pub fn io(op: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Io { op, source }
    }

    /// Whether this error ends the process with a success status
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        if self.is_timeout() { 0 } else { 1 }
    }
}

/// Result type alias for mync operations
pub type Result<T> = std::result::Result<T, MyncError>;
