//! Configuration system for mync.
//!
//! Two layers:
//! 1. Config file (~/.config/mync/mync.yml or .mync.yml)
//! 2. Command-line flags, which override the file

use eyre::Result;
use std::path::PathBuf;

pub use self::global::{GlobalConfig, LoadReport};

mod global;

pub type Config = GlobalConfig;

/// Load configuration from the standard search paths.
pub fn load_config(explicit_path: Option<&PathBuf>) -> Result<GlobalConfig> {
    GlobalConfig::load(explicit_path)
}
