// Logging module for structured logging using the tracing crate

use std::error::Error;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize the tracing subscriber for structured logging
///
/// The subscriber is configured with:
/// - An `EnvFilter` at the configured level, overridden by `RUST_LOG`
/// - Pretty or JSON formatting per `logging.format`
/// - Output to stderr, since stdout carries the encoded images
///
/// # Errors
///
/// Returns an error if the level is not a valid filter directive or a
/// global subscriber is already installed.
///
/// # Examples
///
/// ```
/// use storemark::config::LoggingConfig;
/// use storemark::logging::init_subscriber;
///
/// init_subscriber(&LoggingConfig::default()).expect("Failed to initialize logging");
/// tracing::info!("Application started");
/// ```
pub fn init_subscriber(config: &LoggingConfig) -> Result<(), Box<dyn Error>> {
    let filter = build_filter(&config.level)?;

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }

    Ok(())
}

/// `RUST_LOG` if set, else the configured level.
pub fn build_filter(level: &str) -> Result<EnvFilter, Box<dyn Error>> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(level)?),
    }
}

/// Apply the CLI's `--verbose` / `--json-logs` flags over the file config.
pub fn with_overrides(config: &LoggingConfig, verbose: bool, json_logs: bool) -> LoggingConfig {
    LoggingConfig {
        level: if verbose {
            "debug".to_string()
        } else {
            config.level.clone()
        },
        format: if json_logs {
            LogFormat::Json
        } else {
            config.format
        },
    }
}
