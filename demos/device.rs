use std::sync::Arc;

use ntp_face_clock::face;
use ntp_face_clock::scheduler::ClockDisplay;
use ntp_face_clock::util::{init_logging, parse_level};
use ntp_face_clock::{bind_responder, CivilTime, ClockAngles, Config, Device, WallClock};
use tracing::info;

/// Stands in for the panel by logging what would be drawn
struct LogDisplay {
    center: (f64, f64),
}

impl ClockDisplay for LogDisplay {
    fn show_status(&mut self, lines: &[&str]) {
        info!("[panel] {}", lines.join(" | "));
    }

    fn show_face(&mut self, angles: &ClockAngles, time: &CivilTime) {
        let tips: Vec<String> = angles
            .hands()
            .iter()
            .map(|(hand, degrees)| {
                let (x, y) = face::hand_endpoint(self.center, *degrees, hand.length());
                format!("{:?}={:.1}° ({:.0},{:.0})", hand, degrees, x, y)
            })
            .collect();
        info!("[panel] {} {}", time.format_hms(), tips.join(" "));
    }
}

#[tokio::main]
async fn main() -> ntp_face_clock::Result<()> {
    let level = std::env::var("CLOCK_LOG").unwrap_or_else(|_| "info".to_string());
    init_logging(parse_level(&level)?)?;

    // Usage: device [config.json]
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    println!("Starting clock device:");
    println!("- Reference: {}:{}", config.reference_host, config.reference_port);
    println!("- Local offset: {}s + {}s DST", config.utc_offset_secs, config.daylight_offset_secs);
    println!("- Relay: {}", config.responder_bind);

    let socket = bind_responder(config.responder_bind)?;
    let clock = Arc::new(WallClock::new());
    let display = LogDisplay { center: (64.0, 32.0) };
    let mut device = Device::new(config, clock, socket, display)?;

    if let Err(e) = device.boot().await {
        println!("Synchronization failed ({}); serving unsynchronized time", e);
    }
    let _resync = device.spawn_resync();

    device.run().await
}
