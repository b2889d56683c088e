//! Wall-clock time keeping and reference synchronization
//!
//! The device learns the time once from a reference server and then lets a
//! monotonic tick source carry it forward:
//!
//! - [`WallClock`] holds the seed and answers "what time is it now"
//! - [`TimeSource`] performs the SNTP exchange that seeds the clock
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use ntp_face_clock::time::{self, WallClock};
//!
//! #[tokio::main]
//! async fn main() {
//!     let clock = Arc::new(WallClock::new());
//!     match time::synchronize("pool.ntp.org", 3600, 0, &clock).await {
//!         Ok(report) => println!("synchronized to {}", report.seeded_at),
//!         Err(e) => println!("running unsynchronized: {}", e),
//!     }
//!     println!("{:?}", clock.now());
//! }
//! ```

mod clock;
mod source;

pub use self::clock::{CivilTime, ManualMonotonic, Monotonic, SystemMonotonic, WallClock};
pub use self::source::{resolve_reference, synchronize, SyncReport, SyncResult, TimeSource};

#[cfg(test)]
pub(crate) use self::source::tests as test_support;

/// Conversions between NTP timestamps and Unix time
pub mod util {
    use std::time::Duration;
    use crate::core::{MIN_PLAUSIBLE_UNIX, NTP_UNIX_OFFSET};

    const ERA_SECONDS: u64 = 1 << 32;
    const NANOS_PER_SEC: u64 = 1_000_000_000;

    /// Converts NTP seconds to Unix seconds
    ///
    /// Values below the Unix epoch offset are taken to belong to NTP era 1,
    /// which begins on 2036-02-07.
    pub fn ntp_to_unix_secs(ntp_secs: u32) -> u64 {
        let secs = ntp_secs as u64;
        if secs >= NTP_UNIX_OFFSET {
            secs - NTP_UNIX_OFFSET
        } else {
            secs + ERA_SECONDS - NTP_UNIX_OFFSET
        }
    }

    /// Converts Unix seconds to NTP seconds, wrapping at the era boundary
    pub fn unix_to_ntp_secs(unix_secs: u64) -> u32 {
        ((unix_secs + NTP_UNIX_OFFSET) % ERA_SECONDS) as u32
    }

    /// Converts a 64-bit NTP timestamp (32.32 fixed point) to time since the Unix epoch
    pub fn ntp_timestamp_to_unix(timestamp: u64) -> Duration {
        let secs = ntp_to_unix_secs((timestamp >> 32) as u32);
        let frac = timestamp & 0xFFFF_FFFF;
        let nanos = (frac * NANOS_PER_SEC) >> 32;
        Duration::new(secs, nanos as u32)
    }

    /// Converts time since the Unix epoch to a 64-bit NTP timestamp
    pub fn unix_to_ntp_timestamp(unix: Duration) -> u64 {
        let secs = unix_to_ntp_secs(unix.as_secs()) as u64;
        let frac = ((unix.subsec_nanos() as u64) << 32) / NANOS_PER_SEC;
        (secs << 32) | frac
    }

    /// Whether a reference time is recent enough to be trusted
    pub fn is_plausible(unix: Duration) -> bool {
        unix.as_secs() >= MIN_PLAUSIBLE_UNIX
    }
}
