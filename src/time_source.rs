//! Clock sources for real and offset (simulated) time.
//!
//! Every component reads "now" through a [`TimeSource`] handed to it by the runtime;
//! nothing calls `Local::now()` directly. Simulation shifts the real clock by a fixed
//! offset captured once at startup, so simulated time keeps ticking at real speed.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveTime, TimeZone, Timelike};

/// Source of the current instant.
pub trait TimeSource {
    fn now(&self) -> DateTime<Local>;

    /// Whether readings are shifted away from the real clock.
    fn is_simulated(&self) -> bool;
}

/// The system clock.
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Real clock shifted by a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct OffsetTimeSource {
    offset: Duration,
}

impl OffsetTimeSource {
    pub fn new(offset: Duration) -> Self {
        Self { offset }
    }

    /// Build a source whose clock reads `time` (and `date`, if given) right now.
    pub fn from_simulation(time: &str, date: Option<&str>) -> Result<Self> {
        let offset = parse_simulation(time, date, Local::now())?;
        Ok(Self::new(offset))
    }

    pub fn offset(&self) -> Duration {
        self.offset
    }
}

impl TimeSource for OffsetTimeSource {
    fn now(&self) -> DateTime<Local> {
        Local::now() + self.offset
    }

    fn is_simulated(&self) -> bool {
        true
    }
}

/// Compute the offset that moves `real_now` to the requested simulated instant.
///
/// `time` is `HH:MM` (seconds are zeroed); `date` is `YYYY-MM-DD` and defaults to
/// the real date.
pub fn parse_simulation(time: &str, date: Option<&str>, real_now: DateTime<Local>) -> Result<Duration> {
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .with_context(|| format!("Invalid simulation time '{time}', expected HH:MM"))?;

    let date = match date {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .with_context(|| format!("Invalid simulation date '{raw}', expected YYYY-MM-DD"))?,
        None => real_now.date_naive(),
    };

    let target = Local
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .with_context(|| format!("Simulation instant {date} {time} does not exist locally"))?;

    Ok(target - real_now)
}

/// Settable clock for deterministic tests.
#[cfg(any(test, feature = "testing-support"))]
pub struct ManualTimeSource {
    current: std::cell::Cell<DateTime<Local>>,
}

#[cfg(any(test, feature = "testing-support"))]
impl ManualTimeSource {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            current: std::cell::Cell::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Local>) {
        self.current.set(instant);
    }

    pub fn advance(&self, by: Duration) {
        self.current.set(self.current.get() + by);
    }
}

#[cfg(any(test, feature = "testing-support"))]
impl TimeSource for ManualTimeSource {
    fn now(&self) -> DateTime<Local> {
        self.current.get()
    }

    fn is_simulated(&self) -> bool {
        true
    }
}

const DAY_NAMES: [&str; 7] = ["Minggu", "Senin", "Selasa", "Rabu", "Kamis", "Jumat", "Sabtu"];
const MONTH_NAMES: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

/// Header clock strings for one instant.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ClockFace {
    pub hours: String,
    pub minutes: String,
    pub seconds: String,
    /// `HH:MM`
    pub time: String,
    pub day_name: String,
    /// e.g. `Jumat, 5 Januari 2024`
    pub date: String,
}

impl ClockFace {
    pub fn from_instant<T: Datelike + Timelike>(now: &T) -> Self {
        let day_name = DAY_NAMES[now.weekday().num_days_from_sunday() as usize].to_string();
        let month = MONTH_NAMES[now.month0() as usize];
        let hours = format!("{:02}", now.hour());
        let minutes = format!("{:02}", now.minute());

        Self {
            time: format!("{hours}:{minutes}"),
            date: format!("{day_name}, {} {month} {}", now.day(), now.year()),
            seconds: format!("{:02}", now.second()),
            hours,
            minutes,
            day_name,
        }
    }
}
