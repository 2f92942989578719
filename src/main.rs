use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::io::IsTerminal;
use std::path::PathBuf;

use mync::cli::Cli;
use mync::config::{Config, LoadReport};
use mync::session::{self, Outcome};
use mync::MyncError;

/// Filter from RUST_LOG when set, else the configured level; `-v` pins the level to info
fn logger_builder(config: &Config, verbose: bool, env_filter: Option<&str>) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(env_filter.unwrap_or(config.log_level.as_str()));
    if verbose {
        builder.filter_level(log::LevelFilter::Info);
    }
    builder
}

fn setup_logging(config: &Config, verbose: bool) -> Result<()> {
    let env_filter = std::env::var(env_logger::DEFAULT_FILTER_ENV).ok();
    let mut builder = logger_builder(config, verbose, env_filter.as_deref());
    if let Ok(style) = std::env::var(env_logger::DEFAULT_WRITE_STYLE_ENV) {
        builder.parse_write_style(&style);
    }

    if let Some(log_file) = &config.log_file {
        let target = Box::new(
            fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)
                .context("Failed to open log file")?,
        );
        builder.target(env_logger::Target::Pipe(target));
    } else {
        builder.target(env_logger::Target::Stderr);
    }

    builder.init();
    Ok(())
}

fn diagnostic(message: impl std::fmt::Display) {
    let line = format!("mync: {}", message);
    if std::io::stderr().is_terminal() {
        eprintln!("{}", line.red());
    } else {
        eprintln!("{}", line);
    }
}

fn run_session(cli: &Cli, config: &Config) -> Result<i32> {
    let session_config = cli.session_config(config);

    // Current-thread runtime; stdin reads run on the blocking pool and are
    // abandoned at shutdown instead of joined.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;

    let result = runtime.block_on(session::run(&session_config));
    runtime.shutdown_background();

    let code = match result {
        Ok(Outcome::Relayed(stats)) => {
            info!("Relay finished: {} bytes in {} chunks", stats.total(), stats.chunks);
            0
        }
        Ok(Outcome::Launched(status)) => {
            if !status.success() {
                diagnostic(&status);
            }
            0
        }
        Err(MyncError::TimedOut) => {
            info!("Deadline reached, exiting");
            0
        }
        Err(e) => {
            diagnostic(&e);
            e.exit_code()
        }
    };
    Ok(code)
}

/// Load the config, flattening a failure into one diagnostic line
fn load_config(path: Option<&PathBuf>) -> std::result::Result<LoadReport, String> {
    Config::load_report(path)
        .context("Failed to load configuration")
        .map_err(|e| format!("{:#}", e))
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration; skipped files are logged once the logger exists
    let report = match load_config(cli.config.as_ref()) {
        Ok(report) => report,
        Err(message) => {
            diagnostic(message);
            std::process::exit(1);
        }
    };

    if let Err(e) = setup_logging(&report.config, cli.is_verbose()).context("Failed to setup logging") {
        diagnostic(format!("{:#}", e));
        std::process::exit(1);
    }
    report.log();
    info!("Starting with config from: {:?}", cli.config);

    let code = run_session(&cli, &report.config)?;
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, LevelFilter, Log, Metadata};

    fn enabled(logger: &env_logger::Logger, level: Level) -> bool {
        logger.enabled(&Metadata::builder().level(level).target("mync").build())
    }

    #[test]
    fn test_bad_explicit_config_is_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mync.yml");
        fs::write(&path, "buffer-size: 0\n").unwrap();

        let message = load_config(Some(&path)).unwrap_err();
        assert!(!message.contains('\n'));
        assert!(message.starts_with("Failed to load configuration"));
        assert!(message.contains("buffer-size must be > 0"));

        let missing = dir.path().join("absent.yml");
        let message = load_config(Some(&missing)).unwrap_err();
        assert!(message.contains("absent.yml"));
    }

    #[test]
    fn test_configured_level_used_without_env() {
        let config = Config::default();
        let logger = logger_builder(&config, false, None).build();
        assert_eq!(logger.filter(), LevelFilter::Warn);
        assert!(enabled(&logger, Level::Warn));
        assert!(!enabled(&logger, Level::Info));
    }

    #[test]
    fn test_env_filter_overrides_config() {
        let config = Config::default();
        let logger = logger_builder(&config, false, Some("debug")).build();
        assert!(enabled(&logger, Level::Debug));
    }

    #[test]
    fn test_verbose_wins_over_env_filter() {
        let config = Config::default();
        let logger = logger_builder(&config, true, Some("error")).build();
        assert!(enabled(&logger, Level::Info));
        assert!(!enabled(&logger, Level::Debug));

        let logger = logger_builder(&config, true, None).build();
        assert!(enabled(&logger, Level::Info));
    }
}
