//! mync - a minimal netcat
//!
//! Relays bytes between the process's own stdin/stdout, TCP, UDP and Unix
//! domain sockets, or hands a socket pair to a child command as its stdio.

pub mod cli;
pub mod command;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod governor;
pub mod launcher;
pub mod relay;
pub mod session;

pub use error::{MyncError, Result};
