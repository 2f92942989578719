//! Global configuration.
//!
//! Loaded from ~/.config/mync/mync.yml or .mync.yml

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::endpoint::udp::DEFAULT_ACK;
use crate::relay::DEFAULT_BUFFER_SIZE;

/// Global configuration for mync.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Deadline in seconds when `-t` is not given (0 = none).
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Relay chunk size in bytes.
    #[serde(rename = "buffer-size")]
    pub buffer_size: usize,

    /// Acknowledgement a UDP server sends after the first datagram.
    #[serde(rename = "ack-payload")]
    pub ack_payload: String,

    /// Append log records here instead of stderr.
    #[serde(rename = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset.
    #[serde(rename = "log-level")]
    pub log_level: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 0,
            buffer_size: DEFAULT_BUFFER_SIZE,
            ack_payload: String::from_utf8_lossy(&DEFAULT_ACK).into_owned(),
            log_file: None,
            log_level: "warn".to_string(),
        }
    }
}

/// Result of a config search: the configuration plus what the search found
/// along the way, kept until logging is set up.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub config: GlobalConfig,
    /// File the configuration came from, `None` for defaults
    pub source: Option<PathBuf>,
    /// Implicit config files that were skipped, with the reason
    pub warnings: Vec<String>,
}

impl GlobalConfig {
    /// Load configuration with fallback chain, logging what was skipped.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. .mync.yml in current directory
    /// 3. ~/.config/mync/mync.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let report = Self::load_report(config_path)?;
        report.log();
        Ok(report.config)
    }

    /// As [`GlobalConfig::load`], but returns skipped-file warnings instead of logging them
    pub fn load_report(config_path: Option<&PathBuf>) -> Result<LoadReport> {
        Self::load_from_paths(config_path, &Self::search_paths())
    }

    /// Implicit config locations, in search order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".mync.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("mync").join("mync.yml"));
        }
        paths
    }

    /// Explicit path first, then the first of `candidates` that loads and validates
    pub fn load_from_paths(config_path: Option<&PathBuf>, candidates: &[PathBuf]) -> Result<LoadReport> {
        // Explicit path takes precedence
        if let Some(path) = config_path {
            let config = Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()))?;
            config
                .validate()
                .context(format!("Invalid config in {}", path.display()))?;
            return Ok(LoadReport {
                config,
                source: Some(path.clone()),
                warnings: Vec::new(),
            });
        }

        let mut warnings = Vec::new();
        for candidate in candidates.iter().filter(|path| path.exists()) {
            match Self::load_from_file(candidate).and_then(|c| c.validate().map(|_| c)) {
                Ok(config) => {
                    return Ok(LoadReport {
                        config,
                        source: Some(candidate.clone()),
                        warnings,
                    });
                }
                Err(e) => warnings.push(format!("Failed to load {}: {:#}", candidate.display(), e)),
            }
        }

        Ok(LoadReport {
            config: Self::default(),
            source: None,
            warnings,
        })
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            eyre::bail!("buffer-size must be > 0");
        }
        if self.ack_payload.len() != 3 {
            eyre::bail!("ack-payload must be exactly 3 bytes, got {}", self.ack_payload.len());
        }
        Ok(())
    }

    /// The acknowledgement as a fixed 3-byte array
    pub fn ack(&self) -> [u8; 3] {
        self.ack_payload.as_bytes().try_into().unwrap_or(DEFAULT_ACK)
    }
}

impl LoadReport {
    /// Emit the skipped-file warnings and the chosen source
    pub fn log(&self) {
        for warning in &self.warnings {
            log::warn!("{}", warning);
        }
        match &self.source {
            Some(path) => log::info!("Loaded config from {}", path.display()),
            None => log::debug!("No config file found, using defaults"),
        }
    }
}
