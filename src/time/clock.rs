use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Timelike, Utc};

use crate::core::{Error, Result};

/// Source of monotonic ticks used to carry the clock forward after seeding
pub trait Monotonic: Send + Sync + fmt::Debug {
    /// Time elapsed since an arbitrary fixed origin; never decreases
    fn elapsed(&self) -> Duration;
}

/// Monotonic ticks from the operating system
#[derive(Debug, Clone, Copy)]
pub struct SystemMonotonic {
    origin: Instant,
}

impl SystemMonotonic {
    /// Starts counting from now
    pub fn new() -> Self {
        SystemMonotonic { origin: Instant::now() }
    }
}

impl Default for SystemMonotonic {
    fn default() -> Self {
        Self::new()
    }
}

impl Monotonic for SystemMonotonic {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Tick source that only moves when told to
///
/// Lets a harness drive the clock deterministically without sleeping.
#[derive(Debug, Default)]
pub struct ManualMonotonic {
    nanos: AtomicU64,
}

impl ManualMonotonic {
    /// Creates a tick source at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the tick source forward, stopping at the largest representable reading
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        let _ = self.nanos.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            Some(current.saturating_add(nanos))
        });
    }
}

impl Monotonic for ManualMonotonic {
    fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// Calendar decomposition of an instant in local civil time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CivilTime(DateTime<FixedOffset>);

impl CivilTime {
    /// Decomposes time since the Unix epoch at the given local offset
    pub fn from_unix(unix: Duration, offset: FixedOffset) -> Option<Self> {
        let secs = i64::try_from(unix.as_secs()).ok()?;
        let utc = DateTime::<Utc>::from_timestamp(secs, unix.subsec_nanos())?;
        Some(CivilTime(utc.with_timezone(&offset)))
    }

    /// Hour of the day, 0-23
    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    /// Minute of the hour, 0-59
    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    /// Second of the minute, 0-59
    pub fn second(&self) -> u32 {
        self.0.second()
    }

    /// Local calendar date
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// Full local date and time
    pub fn datetime(&self) -> DateTime<FixedOffset> {
        self.0
    }

    /// Hour, minute and second as a tuple
    pub fn hms(&self) -> (u32, u32, u32) {
        (self.hour(), self.minute(), self.second())
    }

    /// Formats as `HH:MM:SS`
    pub fn format_hms(&self) -> String {
        self.0.format("%H:%M:%S").to_string()
    }
}

impl fmt::Display for CivilTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// Reference point captured when the clock is seeded
#[derive(Debug, Clone, Copy)]
struct Seed {
    /// UTC time since the Unix epoch at the moment of seeding
    unix: Duration,
    /// Offset from UTC to local civil time
    offset: FixedOffset,
    /// Monotonic reading at the moment of seeding
    at: Duration,
}

/// The device's notion of current time
///
/// Unseeded until a reference exchange succeeds. After seeding, reads are
/// `seed + ticks elapsed since seeding`, so they never go backwards unless the
/// clock is re-seeded. The seed and its tick reading are replaced together
/// under one lock, so a concurrent resync can never be observed half-applied.
pub struct WallClock {
    ticks: Arc<dyn Monotonic>,
    seed: RwLock<Option<Seed>>,
}

impl WallClock {
    /// Creates an unseeded clock driven by system ticks
    pub fn new() -> Self {
        Self::with_monotonic(Arc::new(SystemMonotonic::new()))
    }

    /// Creates an unseeded clock driven by the given tick source
    pub fn with_monotonic(ticks: Arc<dyn Monotonic>) -> Self {
        WallClock {
            ticks,
            seed: RwLock::new(None),
        }
    }

    /// Sets the current UTC time, keeping any previously configured local offset
    pub fn seed(&self, unix: Duration) {
        let offset = self.read_seed().map(|s| s.offset).unwrap_or_else(|| Utc.fix());
        self.store(unix, offset);
    }

    /// Sets the current UTC time and the local offset in one step
    ///
    /// Offsets of a day or more cannot be represented and fall back to UTC.
    pub fn seed_with_offset(&self, unix: Duration, offset_secs: i32) {
        let offset = FixedOffset::east_opt(offset_secs).unwrap_or_else(|| {
            tracing::warn!(offset_secs, "Local offset out of range, using UTC");
            Utc.fix()
        });
        self.store(unix, offset);
    }

    /// Whether a seed has ever been applied
    pub fn is_seeded(&self) -> bool {
        self.read_seed().is_some()
    }

    /// Current UTC time since the Unix epoch, if seeded and representable
    pub fn unix_time(&self) -> Option<Duration> {
        let seed = self.read_seed()?;
        self.current(&seed)
    }

    /// Current local civil time, or `None` if the clock was never seeded
    /// or has run past what a calendar date can represent
    pub fn now(&self) -> Option<CivilTime> {
        let seed = self.read_seed()?;
        CivilTime::from_unix(self.current(&seed)?, seed.offset)
    }

    /// Like [`WallClock::now`], but reports an unseeded clock as an error
    pub fn require_now(&self) -> Result<CivilTime> {
        self.now().ok_or(Error::UnseededClock)
    }

    /// Local offset from UTC in seconds, if seeded
    pub fn utc_offset_secs(&self) -> Option<i32> {
        self.read_seed().map(|s| s.offset.local_minus_utc())
    }

    fn store(&self, unix: Duration, offset: FixedOffset) {
        let seed = Seed {
            unix,
            offset,
            at: self.ticks.elapsed(),
        };
        *self.seed.write().unwrap_or_else(PoisonError::into_inner) = Some(seed);
    }

    fn current(&self, seed: &Seed) -> Option<Duration> {
        let elapsed = self.ticks.elapsed().saturating_sub(seed.at);
        seed.unix.checked_add(elapsed)
    }

    fn read_seed(&self) -> Option<Seed> {
        *self.seed.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WallClock")
            .field("ticks", &self.ticks)
            .field("seed", &self.read_seed())
            .finish()
    }
}
