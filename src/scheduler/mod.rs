//! Cooperative device cycle
//!
//! The device synchronizes once at boot, then repeats a fixed cycle: answer
//! pending time queries, let the page collaborator serve, and render the
//! clock face. [`Device::run_cycle`] performs exactly one cycle without any
//! waiting, so a harness can drive the device step by step; [`Device::run`]
//! repeats it on the configured interval.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{info, trace, warn};

use crate::core::{Config, Result};
use crate::face::{self, ClockAngles};
use crate::network::{PollOutcome, TimeResponder, Transport};
use crate::status::StatusView;
use crate::time::{CivilTime, SyncResult, TimeSource, WallClock};

/// Upper bound on queries answered in a single cycle
const MAX_QUERIES_PER_CYCLE: usize = 8;

/// Consumer of rendered frames; owns all pixel drawing
pub trait ClockDisplay {
    /// Shows a few lines of status text
    fn show_status(&mut self, lines: &[&str]);

    /// Draws the clock face for `time`
    fn show_face(&mut self, angles: &ClockAngles, time: &CivilTime);
}

/// Serves the status page, if the device has one
pub trait PageServer {
    /// Handles any pending page requests without blocking
    fn handle_pending(&mut self, status: &StatusView);
}

impl PageServer for () {
    fn handle_pending(&mut self, _status: &StatusView) {}
}

/// What one cycle did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Queries answered
    pub replies: usize,
    /// Datagrams dropped as malformed
    pub discarded: usize,
    /// Whether a clock face was rendered
    pub rendered: bool,
}

/// The clock device: one clock, one responder, one display
pub struct Device<T, D, P = ()> {
    config: Config,
    clock: Arc<WallClock>,
    source: TimeSource,
    responder: TimeResponder<T>,
    display: D,
    pages: P,
    status: StatusView,
}

impl<T: Transport, D: ClockDisplay> Device<T, D, ()> {
    /// Creates a device without a status page
    pub fn new(config: Config, clock: Arc<WallClock>, transport: T, display: D) -> Result<Self> {
        Self::with_pages(config, clock, transport, display, ())
    }
}

impl<T: Transport, D: ClockDisplay, P: PageServer> Device<T, D, P> {
    /// Creates a device whose cycle also services `pages`
    pub fn with_pages(
        config: Config,
        clock: Arc<WallClock>,
        transport: T,
        display: D,
        pages: P,
    ) -> Result<Self> {
        config.validate()?;

        let responder_port = transport
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or(config.responder_bind.port());

        Ok(Device {
            source: TimeSource::new(config.sync_config()),
            responder: TimeResponder::new(transport, clock.clone()),
            status: StatusView::new(clock.clone(), responder_port),
            config,
            clock,
            display,
            pages,
        })
    }

    /// Synchronizes with the reference and reports progress on the display
    ///
    /// A failed synchronization is returned for reporting only; the device
    /// stays fully operational with an unsynchronized clock.
    pub async fn boot(&mut self) -> SyncResult {
        self.display.show_status(&["NTP Sync", "SYNCING..."]);

        let result = self.source.synchronize(&self.clock).await;
        match &result {
            Ok(report) => {
                let seeded = report.seeded_at.format("%H:%M:%S UTC").to_string();
                self.display.show_status(&["NTP Sync", "OK", seeded.as_str()]);
            }
            Err(e) => {
                warn!(error = %e, "Continuing with unsynchronized clock");
                self.display.show_status(&["NTP Sync", "FAILED"]);
            }
        }

        self.display.show_status(&["System Ready", "NTP Server ON"]);
        info!(port = self.status.responder_port(), synchronized = result.is_ok(), "Device ready");
        result
    }

    /// Runs one cycle: responder, page server, then the clock face
    pub fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        for _ in 0..MAX_QUERIES_PER_CYCLE {
            match self.responder.poll_and_respond() {
                Ok(PollOutcome::Idle) => break,
                Ok(PollOutcome::Discarded) => report.discarded += 1,
                Ok(PollOutcome::Replied { .. }) => report.replies += 1,
                Err(e) => {
                    warn!(error = %e, "Time responder failed");
                    break;
                }
            }
        }

        self.pages.handle_pending(&self.status);

        if let Some(now) = self.clock.now() {
            let (hour, minute, second) = now.hms();
            let angles = face::project(hour, minute, second);
            self.display.show_face(&angles, &now);
            report.rendered = true;
        }

        trace!(?report, "Cycle complete");
        report
    }

    /// Repeats [`Device::run_cycle`] every `cycle_interval`, forever
    pub async fn run(&mut self) -> Result<()> {
        let mut ticker = interval(self.config.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.run_cycle();
        }
    }

    /// Starts background resynchronization if a resync interval is configured
    pub fn spawn_resync(&self) -> Option<JoinHandle<()>> {
        let period = self.config.resync_interval?;
        let source = self.source.clone();
        let clock = self.clock.clone();

        Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = source.synchronize(&clock).await {
                    warn!(error = %e, "Resynchronization failed, keeping previous seed");
                }
            }
        }))
    }

    /// Shared clock
    pub fn clock(&self) -> &Arc<WallClock> {
        &self.clock
    }

    /// Status queries
    pub fn status(&self) -> &StatusView {
        &self.status
    }

    /// Display collaborator
    pub fn display(&self) -> &D {
        &self.display
    }

    /// Time responder
    pub fn responder(&self) -> &TimeResponder<T> {
        &self.responder
    }

    /// Responder, mutably
    pub fn responder_mut(&mut self) -> &mut TimeResponder<T> {
        &mut self.responder
    }

    /// Page collaborator
    pub fn pages(&self) -> &P {
        &self.pages
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::net::SocketAddr;
    use std::rc::Rc;
    use std::time::Duration;

    use crate::core::Error;
    use crate::network::mock::MockTransport;
    use crate::protocol::{LeapIndicator, TimeQueryPacket, TimeReplyPacket};
    use crate::time::test_support::{fake_reference, Behavior};
    use crate::time::ManualMonotonic;

    #[derive(Debug, Default)]
    struct RecordingDisplay {
        statuses: Vec<Vec<String>>,
        frames: Vec<(ClockAngles, CivilTime)>,
        events: Option<Rc<RefCell<Vec<&'static str>>>>,
    }

    impl ClockDisplay for RecordingDisplay {
        fn show_status(&mut self, lines: &[&str]) {
            self.statuses.push(lines.iter().map(|l| l.to_string()).collect());
        }

        fn show_face(&mut self, angles: &ClockAngles, time: &CivilTime) {
            if let Some(events) = &self.events {
                events.borrow_mut().push("face");
            }
            self.frames.push((*angles, *time));
        }
    }

    struct RecordingPages {
        events: Rc<RefCell<Vec<&'static str>>>,
        seen: Vec<Option<String>>,
    }

    impl PageServer for RecordingPages {
        fn handle_pending(&mut self, status: &StatusView) {
            self.events.borrow_mut().push("pages");
            self.seen.push(status.time_string());
        }
    }

    fn peer() -> SocketAddr {
        "10.0.0.7:5000".parse().unwrap()
    }

    fn manual_device() -> (Arc<ManualMonotonic>, Device<MockTransport, RecordingDisplay>) {
        let ticks = Arc::new(ManualMonotonic::new());
        let clock = Arc::new(WallClock::with_monotonic(ticks.clone()));
        let device = Device::new(Config::default(), clock, MockTransport::default(), RecordingDisplay::default())
            .unwrap();
        (ticks, device)
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config {
            cycle_interval: Duration::ZERO,
            ..Default::default()
        };
        let result = Device::new(config, Arc::new(WallClock::new()), MockTransport::default(), RecordingDisplay::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_unseeded_cycle_renders_nothing() {
        let (_, mut device) = manual_device();
        device.responder_mut().transport_mut().push(TimeQueryPacket::client(1).as_bytes(), peer());

        let report = device.run_cycle();
        assert_eq!(report, CycleReport { replies: 1, discarded: 0, rendered: false });
        assert!(device.display().frames.is_empty());

        let (bytes, _) = &device.responder().transport().sent[0];
        let reply = TimeReplyPacket::parse(bytes).unwrap();
        assert_eq!(reply.leap_indicator(), LeapIndicator::Unsynchronized);
    }

    #[test]
    fn test_seeded_clock_renders_expected_angles() {
        let (ticks, mut device) = manual_device();
        device.clock().seed(Duration::from_secs(1_715_000_000));

        let report = device.run_cycle();
        assert!(report.rendered);
        assert_eq!(report.replies, 0);

        // 12:53:20 UTC
        let (angles, time) = device.display().frames[0];
        assert_eq!(time.hms(), (12, 53, 20));
        assert!((angles.hour - 26.5).abs() < 1e-9);
        assert!((angles.minute - 320.0).abs() < 1e-9);
        assert!((angles.second - 120.0).abs() < 1e-9);

        // Angles are recomputed from the clock on every cycle
        ticks.advance(Duration::from_secs(1));
        device.run_cycle();
        let (angles, _) = device.display().frames[1];
        assert!((angles.second - 126.0).abs() < 1e-9);
        assert!((angles.minute - 320.1).abs() < 1e-9);
    }

    #[test]
    fn test_cycle_drains_bounded_number_of_queries() {
        let (_, mut device) = manual_device();
        device.clock().seed(Duration::from_secs(1_715_000_000));

        let transport = device.responder_mut().transport_mut();
        transport.push(&[0u8; 3], peer());
        for nonce in 0..10 {
            transport.push(TimeQueryPacket::client(nonce).as_bytes(), peer());
        }

        let first = device.run_cycle();
        assert_eq!(first.discarded, 1);
        assert_eq!(first.replies, MAX_QUERIES_PER_CYCLE - 1);

        let second = device.run_cycle();
        assert_eq!(second.replies, 3);
        assert_eq!(device.run_cycle().replies, 0);
        assert_eq!(device.responder().transport().sent.len(), 10);
    }

    #[test]
    fn test_responder_failure_does_not_stop_cycle() {
        let (_, mut device) = manual_device();
        device.clock().seed(Duration::from_secs(1_715_000_000));
        let transport = device.responder_mut().transport_mut();
        transport.fail_sends = true;
        transport.push(TimeQueryPacket::client(1).as_bytes(), peer());

        let report = device.run_cycle();
        assert_eq!(report.replies, 0);
        assert!(report.rendered);
    }

    #[test]
    fn test_cycle_order() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let ticks = Arc::new(ManualMonotonic::new());
        let clock = Arc::new(WallClock::with_monotonic(ticks));
        clock.seed_with_offset(Duration::from_secs(1_715_000_000), 3600);

        let display = RecordingDisplay {
            events: Some(events.clone()),
            ..Default::default()
        };
        let pages = RecordingPages { events: events.clone(), seen: Vec::new() };
        let mut device = Device::with_pages(Config::default(), clock, MockTransport::default(), display, pages)
            .unwrap();

        device.run_cycle();
        assert_eq!(*events.borrow(), vec!["pages", "face"]);
        assert_eq!(device.pages().seen, vec![Some("13:53:20".to_string())]);
        assert_eq!(device.status().responder_port(), 123);
    }

    fn boot_config(server: SocketAddr) -> Config {
        Config {
            reference_host: server.ip().to_string(),
            reference_port: server.port(),
            utc_offset_secs: 0,
            attempt_timeout: Duration::from_millis(200),
            max_attempts: 1,
            retry_delay: Duration::from_millis(10),
            cycle_interval: Duration::from_millis(50),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_boot_success() {
        let (server, handle) = fake_reference(vec![Behavior::Reply(Duration::from_secs(1_715_000_000))]).await;
        let mut device = Device::new(
            boot_config(server),
            Arc::new(WallClock::new()),
            MockTransport::default(),
            RecordingDisplay::default(),
        ).unwrap();

        let report = device.boot().await.unwrap();
        assert_eq!(report.attempts, 1);
        assert!(device.status().is_synchronized());

        let statuses = &device.display().statuses;
        assert_eq!(statuses[0], vec!["NTP Sync", "SYNCING..."]);
        assert_eq!(statuses[1][1], "OK");
        assert_eq!(statuses[2], vec!["System Ready", "NTP Server ON"]);

        assert!(device.run_cycle().rendered);
        handle.abort();
    }

    #[tokio::test]
    async fn test_boot_failure_keeps_device_running() {
        let (server, handle) = fake_reference(vec![]).await;
        let mut device = Device::new(
            boot_config(server),
            Arc::new(WallClock::new()),
            MockTransport::default(),
            RecordingDisplay::default(),
        ).unwrap();

        let result = device.boot().await;
        assert!(matches!(result, Err(Error::SyncTimeout { attempts: 1 })));
        assert_eq!(device.display().statuses[1], vec!["NTP Sync", "FAILED"]);
        assert!(!device.status().is_synchronized());

        device.responder_mut().transport_mut().push(TimeQueryPacket::client(3).as_bytes(), peer());
        let report = device.run_cycle();
        assert_eq!(report.replies, 1);
        assert!(!report.rendered);
        handle.abort();
    }

    #[tokio::test]
    async fn test_run_repeats_cycles() {
        let clock = Arc::new(WallClock::new());
        clock.seed(Duration::from_secs(1_715_000_000));

        let config = Config {
            cycle_interval: Duration::from_millis(20),
            ..Default::default()
        };
        let mut device = Device::new(config, clock, MockTransport::default(), RecordingDisplay::default()).unwrap();

        let result = tokio::time::timeout(Duration::from_millis(150), device.run()).await;
        assert!(result.is_err());
        assert!(device.display().frames.len() >= 2);
    }

    #[tokio::test]
    async fn test_resync_disabled_by_default() {
        let (_, device) = manual_device();
        assert!(device.spawn_resync().is_none());
    }

    #[tokio::test]
    async fn test_resync_task_starts_when_configured() {
        let config = Config {
            resync_interval: Some(Duration::from_secs(3600)),
            ..Default::default()
        };
        let device = Device::new(config, Arc::new(WallClock::new()), MockTransport::default(), RecordingDisplay::default())
            .unwrap();

        let handle = device.spawn_resync().unwrap();
        assert!(!handle.is_finished());
        handle.abort();
    }
}
