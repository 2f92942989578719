//! CLI module for mync - command-line flags.

pub mod commands;

pub use commands::Cli;
