//! Analog clock face projection
//!
//! Maps a wall-clock reading to the angles of the three hands. Angles are in
//! degrees, measured clockwise from the 12 o'clock position, in `[0, 360)`.
//! A renderer working in the usual screen convention (x to the right, y
//! downwards, angle 0 pointing right) uses [`screen_radians`], which places
//! 12 o'clock at -90°.
//!
//! Everything here is pure: no display, no clock, no I/O.

use serde::Serialize;

/// Degrees the hour hand moves per hour
const HOUR_DEGREES: f64 = 30.0;
/// Degrees the hour hand creeps per minute
const HOUR_CREEP_PER_MINUTE: f64 = 0.5;
/// Degrees the minute and second hands move per tick of the dial
const DEGREES_PER_TICK: f64 = 6.0;
/// Degrees the minute hand creeps per second
const MINUTE_CREEP_PER_SECOND: f64 = 0.1;

/// Hour hand length in pixels on a radius-30 face
pub const HOUR_HAND_LENGTH: f64 = 14.0;
/// Minute hand length in pixels
pub const MINUTE_HAND_LENGTH: f64 = 22.0;
/// Second hand length in pixels
pub const SECOND_HAND_LENGTH: f64 = 28.0;

/// Which hand an angle belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Hand {
    Hour,
    Minute,
    Second,
}

impl Hand {
    /// Default drawing length
    pub fn length(self) -> f64 {
        match self {
            Hand::Hour => HOUR_HAND_LENGTH,
            Hand::Minute => MINUTE_HAND_LENGTH,
            Hand::Second => SECOND_HAND_LENGTH,
        }
    }
}

/// Angles of the three hands, in face degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClockAngles {
    pub hour: f64,
    pub minute: f64,
    pub second: f64,
}

impl ClockAngles {
    /// Hands in drawing order with their angles
    pub fn hands(&self) -> [(Hand, f64); 3] {
        [
            (Hand::Hour, self.hour),
            (Hand::Minute, self.minute),
            (Hand::Second, self.second),
        ]
    }
}

/// Projects a reading onto the clock face
///
/// The hour hand advances 30° per hour plus 0.5° per minute, the minute
/// hand 6° per minute plus 0.1° per second, and the second hand 6° per
/// second. Out-of-range inputs are folded into range rather than rejected.
pub fn project(hour: u32, minute: u32, second: u32) -> ClockAngles {
    let hour = (hour % 12) as f64;
    let minute = (minute % 60) as f64;
    let second = (second % 60) as f64;

    ClockAngles {
        hour: hour * HOUR_DEGREES + minute * HOUR_CREEP_PER_MINUTE,
        minute: minute * DEGREES_PER_TICK + second * MINUTE_CREEP_PER_SECOND,
        second: second * DEGREES_PER_TICK,
    }
}

/// Angles of the twelve hour tick marks
pub fn hour_marks() -> [f64; 12] {
    let mut marks = [0.0; 12];
    for (i, mark) in marks.iter_mut().enumerate() {
        *mark = i as f64 * HOUR_DEGREES;
    }
    marks
}

/// Converts a face angle to radians in screen convention
pub fn screen_radians(degrees: f64) -> f64 {
    (degrees - 90.0).to_radians()
}

/// End point of a hand of `length` drawn from `center` at face angle `degrees`
pub fn hand_endpoint(center: (f64, f64), degrees: f64, length: f64) -> (f64, f64) {
    let radians = screen_radians(degrees);
    (center.0 + radians.cos() * length, center.1 + radians.sin() * length)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn test_midnight_points_up() {
        let angles = project(0, 0, 0);
        assert_eq!(angles, ClockAngles { hour: 0.0, minute: 0.0, second: 0.0 });
        assert_eq!(project(12, 0, 0), angles);
    }

    #[test]
    fn test_six_oclock_is_opposite() {
        assert!(close(project(6, 0, 0).hour, 180.0));
        assert!(close(project(18, 0, 0).hour, 180.0));
        assert!(close(project(3, 0, 0).hour, 90.0));
    }

    #[test]
    fn test_projection_is_deterministic() {
        for hour in 0..24 {
            for minute in (0..60).step_by(7) {
                for second in (0..60).step_by(11) {
                    assert_eq!(project(hour, minute, second), project(hour, minute, second));
                }
            }
        }
    }

    #[test]
    fn test_hands_creep_continuously() {
        for hour in 0..24 {
            let mut previous = project(hour, 0, 0).hour;
            for minute in 1..60 {
                let current = project(hour, minute, 0).hour;
                assert!(current > previous, "hour hand stalled at {}:{}", hour, minute);
                previous = current;
            }
        }

        for minute in 0..60 {
            let mut previous = project(0, minute, 0).minute;
            for second in 1..60 {
                let current = project(0, minute, second).minute;
                assert!(current > previous);
                previous = current;
            }
        }
    }

    #[test]
    fn test_angles_stay_in_range() {
        let angles = project(23, 59, 59);
        assert!(close(angles.hour, 359.5));
        assert!(close(angles.minute, 359.9));
        assert!(close(angles.second, 354.0));
    }

    #[test]
    fn test_known_reading() {
        // 2024-05-06 12:53:20 UTC, the Unix time 1_715_000_000
        let angles = project(12, 53, 20);
        assert!(close(angles.hour, 26.5));
        assert!(close(angles.minute, 320.0));
        assert!(close(angles.second, 120.0));
    }

    #[test]
    fn test_hour_marks() {
        let marks = hour_marks();
        assert_eq!(marks[0], 0.0);
        assert_eq!(marks[3], 90.0);
        assert_eq!(marks[11], 330.0);
    }

    #[test]
    fn test_screen_geometry() {
        let center = (64.0, 32.0);

        let (x, y) = hand_endpoint(center, 0.0, 28.0);
        assert!((x - 64.0).abs() < 1e-6 && (y - 4.0).abs() < 1e-6);

        let (x, y) = hand_endpoint(center, 90.0, 10.0);
        assert!((x - 74.0).abs() < 1e-6 && (y - 32.0).abs() < 1e-6);

        let (x, y) = hand_endpoint(center, 180.0, 10.0);
        assert!((x - 64.0).abs() < 1e-6 && (y - 42.0).abs() < 1e-6);

        assert!(close(screen_radians(0.0), -std::f64::consts::FRAC_PI_2));
    }

    #[test]
    fn test_hand_lengths() {
        let hands = project(0, 0, 0).hands();
        assert_eq!(hands[0].0, Hand::Hour);
        assert_eq!(hands.map(|(hand, _)| hand.length()), [14.0, 22.0, 28.0]);
    }
}
