use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Serialize, Deserialize};

use super::{Error, Result};

/// Largest combined local offset accepted (one day)
const MAX_OFFSET_SECS: i64 = 24 * 3600;

/// Shortest background resync period accepted
const MIN_RESYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Settings for the one-shot exchange with the reference server
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Hostname or IP literal of the reference server
    pub host: String,
    /// UDP port of the reference server
    pub port: u16,
    /// Standard offset from UTC in seconds
    pub utc_offset_secs: i32,
    /// Additional daylight-saving offset in seconds
    pub daylight_offset_secs: i32,
    /// How long to wait for a single reply
    pub attempt_timeout: Duration,
    /// Number of exchanges before reporting a timeout
    pub max_attempts: u32,
    /// Pause between failed exchanges
    pub retry_delay: Duration,
}

impl SyncConfig {
    /// Creates a configuration for `host` with default timing
    pub fn new(host: impl Into<String>, utc_offset_secs: i32, daylight_offset_secs: i32) -> Self {
        SyncConfig {
            host: host.into(),
            utc_offset_secs,
            daylight_offset_secs,
            ..Default::default()
        }
    }

    /// Combined offset from UTC to local civil time
    pub fn local_offset_secs(&self) -> i32 {
        self.utc_offset_secs.saturating_add(self.daylight_offset_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            host: "pool.ntp.org".to_string(),
            port: super::NTP_PORT,
            utc_offset_secs: 0,
            daylight_offset_secs: 0,
            attempt_timeout: Duration::from_secs(2),
            max_attempts: 5,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Configuration for the clock device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reference time server
    pub reference_host: String,
    /// Reference time server port
    pub reference_port: u16,
    /// Standard offset from UTC in seconds
    pub utc_offset_secs: i32,
    /// Daylight-saving offset in seconds
    pub daylight_offset_secs: i32,
    /// Address the local responder listens on
    pub responder_bind: SocketAddr,
    /// Period of the cooperative cycle
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub cycle_interval: Duration,
    /// Timeout for a single reference exchange
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub attempt_timeout: Duration,
    /// Exchanges attempted before synchronization fails
    pub max_attempts: u32,
    /// Pause between failed exchanges
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub retry_delay: Duration,
    /// Background resynchronization period; `None` syncs only at boot
    #[serde(serialize_with = "super::serde::serialize_opt_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_opt_duration")]
    pub resync_interval: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        let sync = SyncConfig::default();
        Config {
            reference_host: sync.host,
            reference_port: sync.port,
            utc_offset_secs: 3600,
            daylight_offset_secs: 0,
            responder_bind: SocketAddr::from(([0, 0, 0, 0], super::NTP_PORT)),
            cycle_interval: Duration::from_secs(1),
            attempt_timeout: sync.attempt_timeout,
            max_attempts: sync.max_attempts,
            retry_delay: sync.retry_delay,
            resync_interval: None,
        }
    }
}

impl Config {
    /// Parses and validates a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Checks that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.reference_host.trim().is_empty() {
            return Err(Error::config("Reference host is empty"));
        }
        if self.reference_port == 0 {
            return Err(Error::config("Reference port must be non-zero"));
        }
        if self.max_attempts == 0 {
            return Err(Error::config("At least one sync attempt is required"));
        }
        if self.cycle_interval.is_zero() {
            return Err(Error::config("Cycle interval must be non-zero"));
        }
        if self.attempt_timeout.is_zero() {
            return Err(Error::config("Attempt timeout must be non-zero"));
        }

        let offset = self.utc_offset_secs as i64 + self.daylight_offset_secs as i64;
        if offset.abs() >= MAX_OFFSET_SECS {
            return Err(Error::config(format!("Local offset {}s is out of range", offset)));
        }

        if let Some(interval) = self.resync_interval {
            if interval < MIN_RESYNC_INTERVAL {
                return Err(Error::config("Resync interval too small"));
            }
        }

        Ok(())
    }

    /// Settings for the reference exchange
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            host: self.reference_host.clone(),
            port: self.reference_port,
            utc_offset_secs: self.utc_offset_secs,
            daylight_offset_secs: self.daylight_offset_secs,
            attempt_timeout: self.attempt_timeout,
            max_attempts: self.max_attempts,
            retry_delay: self.retry_delay,
        }
    }
}
