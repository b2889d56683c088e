//! Core types for the clock and its time relay
//!
//! This module contains the error type, configuration, and the protocol
//! constants shared by every other module.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{Error, Result};
pub use self::types::{Config, SyncConfig};

/// NTP version written into outgoing packets
pub const NTP_VERSION: u8 = 4;

/// Well-known NTP port
pub const NTP_PORT: u16 = 123;

/// Size of an NTP header without extension fields
pub const NTP_PACKET_SIZE: usize = 48;

/// Seconds between the NTP epoch (1900-01-01) and the Unix epoch (1970-01-01)
pub const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// Earliest Unix time accepted from a reference (2016-01-01T00:00:00Z)
pub const MIN_PLAUSIBLE_UNIX: u64 = 1_451_606_400;
