use std::io;
use thiserror::Error;

/// Custom error types for the clock and its time relay
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Resolution error: {0}")]
    Resolve(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Synchronization timed out after {attempts} attempt(s)")]
    SyncTimeout {
        /// Number of exchanges attempted before giving up
        attempts: u32,
    },

    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    #[error("Clock has not been synchronized")]
    UnseededClock,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new network error
    pub fn network(msg: impl Into<String>) -> Self {
        Error::Network(msg.into())
    }

    /// Creates a new resolution error
    pub fn resolve(msg: impl Into<String>) -> Self {
        Error::Resolve(msg.into())
    }

    /// Creates a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Creates a new malformed query error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedQuery(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
