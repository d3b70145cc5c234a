//! Process-wide structured logging on `tracing`.
//!
//! Events go to stderr so that `status --json` output on stdout stays clean.
//! Under systemd, stderr lands in the journal.

#![allow(missing_docs)]

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::core::config::LoggingConfig;
use crate::core::errors::{Result, SraError};

/// Filter from `RUST_LOG` when set and valid, otherwise from the configured level.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|err| SraError::InvalidConfig {
        details: format!("logging.level {:?} is not a valid filter: {err}", config.level),
    })
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!("global subscriber already installed");
    }
    Ok(())
}
