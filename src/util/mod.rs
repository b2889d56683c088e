//! Utility module
//!
//! This module provides logging setup for binaries built on the library.

use tracing::Level;

use crate::core::{Error, Result};

/// Installs a formatting subscriber that prints events at `level` and above
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(level: Level) -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| Error::config(format!("Failed to install log subscriber: {}", e)))
}

/// Parses a level name such as `info` or `DEBUG`
pub fn parse_level(name: &str) -> Result<Level> {
    name.trim()
        .parse::<Level>()
        .map_err(|_| Error::config(format!("Unknown log level: {}", name)))
}
