//! Daily event schedule.
//!
//! A [`DailySchedule`] holds the six adjusted event times for one calendar date and
//! remembers which configuration version produced it. The [`ScheduleCalculator`]
//! owns the loaded schedule and hands out recompute jobs only when the date or the
//! configuration version moved on, so repeated requests for the same day are no-ops.

pub mod lookup;
pub mod solar;

use anyhow::Result;
use chrono::{Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use crate::config::Configuration;
use crate::constants::{FALLBACK_LATITUDE, FALLBACK_LONGITUDE, MINUTES_PER_DAY};
use lookup::{CoordinateOrigin, resolve_coordinates};

pub use lookup::{CoordinateLookup, HttpCoordinateLookup};

/// The six daily events in chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKey {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl EventKey {
    pub const ALL: [EventKey; 6] = [
        EventKey::Fajr,
        EventKey::Sunrise,
        EventKey::Dhuhr,
        EventKey::Asr,
        EventKey::Maghrib,
        EventKey::Isha,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Lowercase key used in settings field names (`adj_fajr`, ...).
    pub fn key(self) -> &'static str {
        match self {
            EventKey::Fajr => "fajr",
            EventKey::Sunrise => "sunrise",
            EventKey::Dhuhr => "dhuhr",
            EventKey::Asr => "asr",
            EventKey::Maghrib => "maghrib",
            EventKey::Isha => "isha",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            EventKey::Fajr => "Subuh",
            EventKey::Sunrise => "Terbit",
            EventKey::Dhuhr => "Dzuhur",
            EventKey::Asr => "Ashar",
            EventKey::Maghrib => "Maghrib",
            EventKey::Isha => "Isya",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            EventKey::Fajr => "icofont-night",
            EventKey::Sunrise => "icofont-hill-sunny",
            EventKey::Dhuhr => "icofont-full-sunny",
            EventKey::Asr => "icofont-hill-sunny",
            EventKey::Maghrib => "icofont-sun-set",
            EventKey::Isha => "icofont-full-night",
        }
    }

    /// Sunrise only marks the end of Fajr; it has no adzan or congregation.
    pub fn has_congregation(self) -> bool {
        self != EventKey::Sunrise
    }
}

/// Add a signed minute adjustment on a 24-hour dial.
pub fn apply_adjustment(time: NaiveTime, minutes: i32) -> NaiveTime {
    let base = (time.hour() * 60 + time.minute()) as i32;
    let total = (base + minutes).rem_euclid(MINUTES_PER_DAY) as u32;
    NaiveTime::from_hms_opt(total / 60, total % 60, 0).unwrap_or(time)
}

/// Adjusted event times for one date.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySchedule {
    date: NaiveDate,
    config_version: u64,
    coordinates: (f64, f64),
    times: [NaiveTime; 6],
}

impl DailySchedule {
    /// Build a schedule from already-adjusted times.
    pub fn new(date: NaiveDate, config_version: u64, coordinates: (f64, f64), times: [NaiveTime; 6]) -> Self {
        Self {
            date,
            config_version,
            coordinates,
            times,
        }
    }

    /// Build a schedule by applying the configured adjustments to raw times.
    pub fn from_raw(
        date: NaiveDate,
        config_version: u64,
        coordinates: (f64, f64),
        raw: [NaiveTime; 6],
        config: &Configuration,
    ) -> Self {
        let times = EventKey::ALL.map(|event| apply_adjustment(raw[event.index()], config.adjustment(event)));
        Self::new(date, config_version, coordinates, times)
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn config_version(&self) -> u64 {
        self.config_version
    }

    pub fn coordinates(&self) -> (f64, f64) {
        self.coordinates
    }

    pub fn time(&self, event: EventKey) -> NaiveTime {
        self.times[event.index()]
    }

    /// The event's instant on the schedule's own date.
    pub fn at(&self, event: EventKey) -> NaiveDateTime {
        self.date.and_time(self.time(event))
    }

    /// First occurrence of `event` strictly after `after`.
    ///
    /// Occurrences on later days reuse this schedule's time of day.
    pub fn occurrence_after(&self, event: EventKey, after: NaiveDateTime) -> NaiveDateTime {
        let mut candidate = after.date().and_time(self.time(event));
        while candidate <= after {
            candidate += Duration::days(1);
        }
        candidate
    }

    /// The next event strictly after `now`, wrapping to tomorrow's first event.
    pub fn next_after(&self, now: NaiveDateTime) -> (EventKey, NaiveDateTime) {
        EventKey::ALL
            .iter()
            .map(|&event| (event, self.occurrence_after(event, now)))
            .min_by_key(|&(event, at)| (at, event.index()))
            .unwrap_or((EventKey::Fajr, self.occurrence_after(EventKey::Fajr, now)))
    }

    pub fn is_current_for(&self, date: NaiveDate, config_version: u64) -> bool {
        self.date == date && self.config_version == config_version
    }
}

/// UTC offset in effect at local noon on `date`.
pub fn local_offset_on(date: NaiveDate) -> FixedOffset {
    let noon = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN));
    Local
        .from_local_datetime(&noon)
        .earliest()
        .map(|dt| *dt.offset())
        .unwrap_or_else(|| *Local::now().offset())
}

pub type ScheduleJob = Pin<Box<dyn Future<Output = Result<DailySchedule>>>>;

/// Owns the loaded schedule and produces recompute jobs.
pub struct ScheduleCalculator {
    lookup: Rc<dyn CoordinateLookup>,
    schedule: Option<DailySchedule>,
}

impl ScheduleCalculator {
    pub fn new(lookup: Rc<dyn CoordinateLookup>) -> Self {
        Self {
            lookup,
            schedule: None,
        }
    }

    pub fn schedule(&self) -> Option<&DailySchedule> {
        self.schedule.as_ref()
    }

    pub fn needs_recompute(&self, today: NaiveDate, config_version: u64) -> bool {
        !self
            .schedule
            .as_ref()
            .is_some_and(|s| s.is_current_for(today, config_version))
    }

    /// Start computing the schedule for `today`.
    ///
    /// Returns `None` when a schedule for this date and configuration version is
    /// already loaded.
    pub fn recompute(
        &self,
        config: &Configuration,
        config_version: u64,
        today: NaiveDate,
        offset: FixedOffset,
    ) -> Option<ScheduleJob> {
        if !self.needs_recompute(today, config_version) {
            return None;
        }

        let lookup = Rc::clone(&self.lookup);
        let config = config.clone();
        Some(Box::pin(async move {
            let (coords, origin) = resolve_coordinates(lookup.as_ref(), &config).await;
            compute_schedule(&config, config_version, today, offset, coords, origin)
        }))
    }

    /// Install a finished schedule.
    pub fn install(&mut self, schedule: DailySchedule) {
        self.schedule = Some(schedule);
    }
}

fn compute_schedule(
    config: &Configuration,
    config_version: u64,
    today: NaiveDate,
    offset: FixedOffset,
    coords: (f64, f64),
    origin: CoordinateOrigin,
) -> Result<DailySchedule> {
    let (coords, raw) = match solar::compute_raw_times(coords.0, coords.1, today, offset) {
        Ok(raw) => (coords, raw),
        Err(e) if origin != CoordinateOrigin::Fallback => {
            log_warning!("Schedule calculation failed: {e:#}");
            log_indented!("Retrying with the fallback location");
            let fallback = (FALLBACK_LATITUDE, FALLBACK_LONGITUDE);
            (fallback, solar::compute_raw_times(fallback.0, fallback.1, today, offset)?)
        }
        Err(e) => return Err(e),
    };

    Ok(DailySchedule::from_raw(today, config_version, coords, raw, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::cell::Cell;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn sample() -> DailySchedule {
        DailySchedule::new(
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            0,
            (FALLBACK_LATITUDE, FALLBACK_LONGITUDE),
            [hm(4, 30), hm(5, 45), hm(12, 0), hm(15, 15), hm(18, 0), hm(19, 15)],
        )
    }

    #[test]
    fn test_apply_adjustment_wraps_around_midnight() {
        assert_eq!(apply_adjustment(hm(0, 10), -20), hm(23, 50));
        assert_eq!(apply_adjustment(hm(23, 50), 15), hm(0, 5));
        assert_eq!(apply_adjustment(hm(12, 0), 0), hm(12, 0));
    }

    #[test]
    fn test_next_after_wraps_to_tomorrow_fajr() {
        let schedule = sample();
        let late = schedule.date().and_time(hm(21, 0));
        let (event, at) = schedule.next_after(late);

        assert_eq!(event, EventKey::Fajr);
        assert_eq!(at, schedule.date().succ_opt().unwrap().and_time(hm(4, 30)));
    }

    #[test]
    fn test_next_after_is_strict() {
        let schedule = sample();
        let (event, _) = schedule.next_after(schedule.at(EventKey::Dhuhr));
        assert_eq!(event, EventKey::Asr);
    }

    #[test]
    fn test_from_raw_applies_adjustments() {
        let config = Configuration {
            adjustments: [2, 0, 0, 0, -3, 0],
            ..Default::default()
        };
        let base = sample();
        let raw = EventKey::ALL.map(|e| base.time(e));
        let adjusted = DailySchedule::from_raw(base.date(), 1, base.coordinates(), raw, &config);

        assert_eq!(adjusted.time(EventKey::Fajr), hm(4, 32));
        assert_eq!(adjusted.time(EventKey::Maghrib), hm(17, 57));
        assert_eq!(adjusted.config_version(), 1);
    }

    struct CountingLookup {
        calls: Cell<u32>,
    }

    #[async_trait(?Send)]
    impl CoordinateLookup for CountingLookup {
        async fn lookup(&self, _city_id: &str) -> Result<(f64, f64)> {
            self.calls.set(self.calls.get() + 1);
            Ok((FALLBACK_LATITUDE, FALLBACK_LONGITUDE))
        }
    }

    #[tokio::test]
    async fn test_recompute_is_idempotent_per_date_and_version() {
        let lookup = Rc::new(CountingLookup { calls: Cell::new(0) });
        let mut calculator = ScheduleCalculator::new(lookup.clone());
        let config = Configuration {
            city_id: Some("1301".into()),
            ..Default::default()
        };
        let today = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let offset = FixedOffset::east_opt(7 * 3600).unwrap();

        let job = calculator.recompute(&config, 0, today, offset).unwrap();
        calculator.install(job.await.unwrap());
        assert_eq!(lookup.calls.get(), 1);

        assert!(calculator.recompute(&config, 0, today, offset).is_none());
        assert!(calculator.recompute(&config, 1, today, offset).is_some());
        assert!(calculator.recompute(&config, 0, today.succ_opt().unwrap(), offset).is_some());
    }
}
