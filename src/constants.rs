//! Application-wide defaults and limits.

use std::time::Duration;

// # Prayer engine defaults (minutes)

pub const DEFAULT_APPROACHING_MINS: u32 = 10;
pub const DEFAULT_ADZAN_DURATION: u32 = 2;
pub const DEFAULT_IQAMAH_DURATION: u32 = 10;
pub const DEFAULT_SHOLAT_DURATION: u32 = 15;

/// Shortest and longest accepted value for any stage duration or window.
pub const MINIMUM_STAGE_MINUTES: u32 = 1;
pub const MAXIMUM_STAGE_MINUTES: u32 = 60;

/// Per-event minute adjustments are clamped to this symmetric range.
pub const MAXIMUM_ADJUSTMENT_MINUTES: i32 = 30;

/// Grace window after an event time during which it is still fired.
pub const EVENT_TOLERANCE_SECONDS: i64 = 60;

pub const MINUTES_PER_DAY: i32 = 1440;

pub const LOADING_COUNTDOWN: &str = "--:--:--";
pub const LOADING_TIME: &str = "--:--";

// # Playlist

pub const DEFAULT_LIMIT_SLIDE: u32 = 10;
pub const DEFAULT_LIMIT_VIDEO: u32 = 1;
pub const DEFAULT_LIMIT_CAMPAIGN: u32 = 1;

pub const DEFAULT_IMAGE_DURATION: Duration = Duration::from_secs(8);
pub const DEFAULT_CAMPAIGN_DURATION: Duration = Duration::from_secs(20);
pub const MINIMUM_CAMPAIGN_SECS: u64 = 12;
pub const MAXIMUM_CAMPAIGN_SECS: u64 = 20;
/// Ceiling for a video whose completion signal never arrives.
pub const VIDEO_FALLBACK_DURATION: Duration = Duration::from_secs(300);

// # Synchronization

pub const SYNC_INITIAL_DELAY: Duration = Duration::from_secs(2);
pub const SYNC_INTERVAL: Duration = Duration::from_secs(30);
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);
pub const FEED_REFRESH_INTERVAL: Duration = Duration::from_secs(300);
pub const ENGINE_TICK_INTERVAL: Duration = Duration::from_secs(1);

pub const DEFAULT_REST_URL: &str = "http://localhost/wp-json/mrty-tv/v1";
pub const DEFAULT_LOOKUP_URL: &str = "https://idsholat.net/wp-json/wp/v2/posts/{id}";

// # Location

/// Used whenever no usable coordinates can be resolved.
pub const FALLBACK_LATITUDE: f64 = -6.6253;
pub const FALLBACK_LONGITUDE: f64 = 106.8210;

// # Calculation method

pub const FAJR_ANGLE: f64 = 20.0;
pub const ISHA_ANGLE: f64 = 18.0;
pub const ASR_SHADOW_FACTOR: f64 = 1.0;

pub const FEED_FALLBACK_ICON: &str = "icofont-info-circle";

// # Exit codes

pub const EXIT_FAILURE: i32 = 1;
