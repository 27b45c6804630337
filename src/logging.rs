//! Tracing subscriber setup
//!
//! The client only emits `tracing` events; installing a subscriber is up to
//! the application. These helpers install the usual fmt subscriber with an
//! `RUST_LOG`-style filter on top of a default level.

use crate::error::{Error, Result};
use crate::types::LogLevel;
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, with `level` as the default directive
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(tracing::Level::from(level).into())
}

/// Install a global fmt subscriber.
///
/// Fails if a global subscriber is already set.
pub fn try_init(level: LogLevel) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .try_init()
        .map_err(|e| Error::config(format!("failed to install tracing subscriber: {e}")))
}

/// Install a global fmt subscriber, keeping any that is already set
pub fn init(level: LogLevel) {
    if try_init(level).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
