//! NTP face clock: a network-synchronized analog clock with a local SNTP relay
//!
//! The device establishes wall-clock time once from a reference server,
//! re-serves that time to peers on the local network, and projects it onto
//! the hands of an analog clock face for a display collaborator to draw.
pub mod core;

pub mod face;
pub mod network;
pub mod protocol;
pub mod scheduler;
pub mod status;
pub mod time;
pub mod util;

// Re-export commonly used items
pub use crate::core::{Config, Error, Result};
pub use face::{project, ClockAngles};
pub use network::{bind_responder, TimeResponder};
pub use scheduler::{ClockDisplay, Device, PageServer};
pub use time::{CivilTime, TimeSource, WallClock};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
