//! Read-only status queries for the page collaborator

use std::sync::Arc;

use serde::Serialize;

use crate::time::WallClock;

/// Point-in-time view of the device state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Local time as `HH:MM:SS`, absent while unsynchronized
    pub time: Option<String>,
    /// Whether the clock has been synchronized
    pub synchronized: bool,
    /// Port the time relay answers on
    pub responder_port: u16,
}

/// Status queries backed by the shared clock
#[derive(Debug, Clone)]
pub struct StatusView {
    clock: Arc<WallClock>,
    responder_port: u16,
}

impl StatusView {
    pub fn new(clock: Arc<WallClock>, responder_port: u16) -> Self {
        StatusView { clock, responder_port }
    }

    /// Current local time formatted for display
    pub fn time_string(&self) -> Option<String> {
        self.clock.now().map(|t| t.format_hms())
    }

    pub fn is_synchronized(&self) -> bool {
        self.clock.is_seeded()
    }

    pub fn responder_port(&self) -> u16 {
        self.responder_port
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            time: self.time_string(),
            synchronized: self.is_synchronized(),
            responder_port: self.responder_port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::time::ManualMonotonic;

    #[test]
    fn test_unsynchronized_status() {
        let status = StatusView::new(Arc::new(WallClock::new()), 123);
        assert_eq!(status.time_string(), None);
        assert!(!status.is_synchronized());

        let json = serde_json::to_string(&status.snapshot()).unwrap();
        assert_eq!(json, r#"{"time":null,"synchronized":false,"responder_port":123}"#);
    }

    #[test]
    fn test_synchronized_status() {
        let ticks = Arc::new(ManualMonotonic::new());
        let clock = Arc::new(WallClock::with_monotonic(ticks.clone()));
        clock.seed_with_offset(Duration::from_secs(1_715_000_000), 3600);
        let status = StatusView::new(clock, 123);

        assert_eq!(status.time_string().as_deref(), Some("13:53:20"));
        ticks.advance(Duration::from_secs(5));
        assert_eq!(
            status.snapshot(),
            StatusSnapshot {
                time: Some("13:53:25".to_string()),
                synchronized: true,
                responder_port: 123,
            }
        );
    }
}
