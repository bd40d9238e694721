//! Solar position math for the six daily events.
//!
//! Fajr and Isha use twilight depression angles of 20° and 18°, Asr uses the
//! standard shadow factor of 1, and Dhuhr is solar transit. Sunrise and Maghrib are
//! the standard horizon events from the `sunrise` crate. At high latitudes, where
//! twilight may never reach the required depression, Fajr and Isha are limited to
//! an angle-based portion of the night.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Timelike};

use crate::constants::{ASR_SHADOW_FACTOR, FAJR_ANGLE, ISHA_ANGLE};

fn dsin(d: f64) -> f64 {
    d.to_radians().sin()
}

fn dcos(d: f64) -> f64 {
    d.to_radians().cos()
}

fn dtan(d: f64) -> f64 {
    d.to_radians().tan()
}

fn darcsin(x: f64) -> f64 {
    x.asin().to_degrees()
}

fn darccos(x: f64) -> f64 {
    x.acos().to_degrees()
}

fn darctan2(y: f64, x: f64) -> f64 {
    y.atan2(x).to_degrees()
}

fn darccot(x: f64) -> f64 {
    (1.0 / x).atan().to_degrees()
}

fn wrap(value: f64, modulus: f64) -> f64 {
    let wrapped = value - modulus * (value / modulus).floor();
    if wrapped < 0.0 { wrapped + modulus } else { wrapped }
}

fn fix_angle(a: f64) -> f64 {
    wrap(a, 360.0)
}

fn fix_hour(h: f64) -> f64 {
    wrap(h, 24.0)
}

/// Julian day number at 00:00 UT of `date`.
fn julian_day(date: NaiveDate) -> f64 {
    let (mut year, mut month) = (f64::from(date.year()), f64::from(date.month()));
    if month <= 2.0 {
        year -= 1.0;
        month += 12.0;
    }
    let a = (year / 100.0).floor();
    let b = 2.0 - a + (a / 4.0).floor();
    (365.25 * (year + 4716.0)).floor() + (30.6001 * (month + 1.0)).floor() + f64::from(date.day())
        + b
        - 1524.5
}

struct SunPosition {
    declination: f64,
    equation_of_time: f64,
}

fn sun_position(jd: f64) -> SunPosition {
    let d = jd - 2_451_545.0;
    let g = fix_angle(357.529 + 0.985_600_28 * d);
    let q = fix_angle(280.459 + 0.985_647_36 * d);
    let l = fix_angle(q + 1.915 * dsin(g) + 0.020 * dsin(2.0 * g));
    let e = 23.439 - 0.000_000_36 * d;

    let right_ascension = darctan2(dcos(e) * dsin(l), dcos(l)) / 15.0;
    SunPosition {
        declination: darcsin(dsin(e) * dsin(l)),
        equation_of_time: q / 15.0 - fix_hour(right_ascension),
    }
}

/// Event times for one date and location, in fractional local hours.
struct SolarDay {
    latitude: f64,
    julian: f64,
}

impl SolarDay {
    fn mid_day(&self, portion: f64) -> f64 {
        let eqt = sun_position(self.julian + portion).equation_of_time;
        fix_hour(12.0 - eqt)
    }

    /// Time at which the sun is `angle` degrees below the horizon.
    fn sun_angle_time(&self, angle: f64, portion: f64, before_noon: bool) -> f64 {
        let decl = sun_position(self.julian + portion).declination;
        let noon = self.mid_day(portion);
        let hour_angle = darccos(
            (-dsin(angle) - dsin(decl) * dsin(self.latitude))
                / (dcos(decl) * dcos(self.latitude)),
        ) / 15.0;
        if before_noon { noon - hour_angle } else { noon + hour_angle }
    }

    fn asr_time(&self, factor: f64, portion: f64) -> f64 {
        let decl = sun_position(self.julian + portion).declination;
        let angle = -darccot(factor + dtan((self.latitude - decl).abs()));
        self.sun_angle_time(angle, portion, false)
    }
}

/// Fractional hours of `instant` relative to midnight of `date`.
fn local_hours(instant: DateTime<FixedOffset>, date: NaiveDate) -> f64 {
    let day_shift = (instant.date_naive() - date).num_days() as f64;
    day_shift * 24.0
        + f64::from(instant.hour())
        + f64::from(instant.minute()) / 60.0
        + f64::from(instant.second()) / 3600.0
}

/// Limit a twilight event to an angle-based share of the night.
fn adjust_high_latitude(time: f64, base: f64, angle: f64, night: f64, before_base: bool) -> f64 {
    let portion = angle / 60.0 * night;
    let diff = if before_base {
        fix_hour(base - time)
    } else {
        fix_hour(time - base)
    };
    if time.is_nan() || diff > portion {
        if before_base { base - portion } else { base + portion }
    } else {
        time
    }
}

/// Round fractional hours to the nearest minute.
fn to_time_of_day(hours: f64) -> Option<NaiveTime> {
    if !hours.is_finite() {
        return None;
    }
    let minutes = (fix_hour(hours + 0.5 / 60.0) * 60.0).floor() as u32;
    NaiveTime::from_hms_opt((minutes / 60) % 24, minutes % 60, 0)
}

/// Compute unadjusted Fajr, Sunrise, Dhuhr, Asr, Maghrib and Isha for `date`.
pub fn compute_raw_times(
    latitude: f64,
    longitude: f64,
    date: NaiveDate,
    offset: FixedOffset,
) -> Result<[NaiveTime; 6]> {
    let coord = sunrise::Coordinates::new(latitude, longitude)
        .ok_or_else(|| anyhow::anyhow!("Invalid coordinates ({latitude}, {longitude})"))?;
    let horizon = sunrise::SolarDay::new(coord, date);
    let sunrise_at = local_hours(
        horizon
            .event_time(sunrise::SolarEvent::Sunrise)
            .with_timezone(&offset),
        date,
    );
    let sunset_at = local_hours(
        horizon
            .event_time(sunrise::SolarEvent::Sunset)
            .with_timezone(&offset),
        date,
    );

    let day = SolarDay {
        latitude,
        julian: julian_day(date) - longitude / (15.0 * 24.0),
    };
    let zone_shift = f64::from(offset.local_minus_utc()) / 3600.0 - longitude / 15.0;

    let fajr = day.sun_angle_time(FAJR_ANGLE, 5.0 / 24.0, true) + zone_shift;
    let dhuhr = day.mid_day(12.0 / 24.0) + zone_shift;
    let asr = day.asr_time(ASR_SHADOW_FACTOR, 13.0 / 24.0) + zone_shift;
    let isha = day.sun_angle_time(ISHA_ANGLE, 18.0 / 24.0, false) + zone_shift;

    let night = fix_hour(sunrise_at - sunset_at);
    let fajr = adjust_high_latitude(fajr, sunrise_at, FAJR_ANGLE, night, true);
    let isha = adjust_high_latitude(isha, sunset_at, ISHA_ANGLE, night, false);

    let hours = [fajr, sunrise_at, dhuhr, asr, sunset_at, isha];
    let mut times = [NaiveTime::MIN; 6];
    for (slot, value) in times.iter_mut().zip(hours) {
        *slot = to_time_of_day(value)
            .with_context(|| format!("No solution for ({latitude}, {longitude}) on {date}"))?;
    }

    Ok(times)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn wib() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    #[test]
    fn test_julian_day_reference_epoch() {
        let jd = julian_day(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
        assert!((jd - 2_451_544.5).abs() < 1e-9);
    }

    #[test]
    fn test_bogor_times_are_plausible_and_ordered() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let times = compute_raw_times(-6.6253, 106.8210, date, wib()).unwrap();

        assert!(times.windows(2).all(|pair| pair[0] < pair[1]), "{times:?}");
        assert!(times[0] > hm(3, 55) && times[0] < hm(4, 40), "fajr {}", times[0]);
        assert!(times[1] > hm(5, 20) && times[1] < hm(5, 55), "sunrise {}", times[1]);
        assert!(times[2] > hm(11, 45) && times[2] < hm(12, 10), "dhuhr {}", times[2]);
        assert!(times[3] > hm(14, 50) && times[3] < hm(15, 40), "asr {}", times[3]);
        assert!(times[4] > hm(17, 55) && times[4] < hm(18, 35), "maghrib {}", times[4]);
        assert!(times[5] > hm(19, 5) && times[5] < hm(19, 50), "isha {}", times[5]);
    }

    #[test]
    fn test_high_latitude_summer_still_yields_times() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        assert!(compute_raw_times(60.17, 24.94, date, offset).is_ok());
    }

    #[test]
    fn test_high_latitude_adjustment_caps_fajr() {
        // Fajr 4 hours before sunrise in a 6 hour night exceeds 20/60 of the night.
        let adjusted = adjust_high_latitude(0.0, 4.0, 20.0, 6.0, true);
        assert!((adjusted - 2.0).abs() < 1e-9);
        assert!((adjust_high_latitude(f64::NAN, 22.0, 18.0, 6.0, false) - 23.8).abs() < 1e-9);
    }

    #[test]
    fn test_to_time_of_day_rounds_to_nearest_minute() {
        assert_eq!(to_time_of_day(4.0 + 29.6 / 60.0), Some(hm(4, 30)));
        assert_eq!(to_time_of_day(4.0 + 29.4 / 60.0), Some(hm(4, 29)));
        assert_eq!(to_time_of_day(f64::NAN), None);
    }
}
