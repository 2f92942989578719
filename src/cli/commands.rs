//! CLI definition using clap.
//!
//! No subcommands: the flags describe a single session, mapped onto
//! [`SessionConfig`] with config-file values filling the gaps.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;
use crate::session::SessionConfig;

/// mync - relay bytes between stdio, sockets and a command
#[derive(Parser, Debug)]
#[command(name = "mync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Command to run with the input/output descriptors as its stdin/stdout
    #[arg(short = 'e', long = "exec", value_name = "CMD")]
    pub exec: Option<String>,

    /// Input mode: TCPS<port>, UDPS<port>, UDSSS<path>, UDSSD<path>
    #[arg(short, long, value_name = "MODE")]
    pub input: Option<String>,

    /// Output mode: any tag, including TCPC<host>,<port> and UDPC<ip>,<port>
    #[arg(short, long, value_name = "MODE")]
    pub output: Option<String>,

    /// Use one transport as both input and output
    #[arg(short, long, value_name = "MODE", conflicts_with_all = ["input", "output"])]
    pub both: Option<String>,

    /// Deadline in seconds (0 disables)
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Optional config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Merge flags over the loaded configuration
    pub fn session_config(&self, config: &Config) -> SessionConfig {
        SessionConfig {
            input: self.input.clone(),
            output: self.output.clone(),
            both: self.both.clone(),
            command: self.exec.clone(),
            timeout_secs: self.timeout.unwrap_or(config.timeout_secs),
            buffer_size: config.buffer_size,
            ack: config.ack(),
        }
    }
}
