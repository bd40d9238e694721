//! Configuration for the signage terminal.
//!
//! Two layers live here:
//!
//! - **[`BootstrapConfig`]**: the local TOML file read once at startup. It says where
//!   the content service lives, how long slides stay on screen, the site identity
//!   shown in the header, and an initial `[settings]` snapshot so the terminal can
//!   compute a schedule before the first sync completes.
//! - **[`Configuration`]**: the synced engine record (stage durations, per-event
//!   adjustments, location, playlist limits). It is replaced wholesale by
//!   [`ConfigStore::merge`] whenever the content service reports new settings.
//!
//! ## Bootstrap file
//!
//! Searched at `$XDG_CONFIG_HOME/mrty-tv/mrty-tv.toml` unless `--config DIR` is given:
//!
//! ```toml
//! #[Content service]
//! rest_url = "https://masjid.example/wp-json/mrty-tv/v1"
//! lookup_url = "https://idsholat.net/wp-json/wp/v2/posts/{id}"
//!
//! #[Rotation]
//! image_duration = 8       # Seconds per image slide
//! campaign_duration = 20   # Seconds per campaign slide (12-20)
//! video_fallback = 300     # Ceiling when a video never reports completion
//!
//! [site]
//! name = "Masjid Raya"
//! running_text = "Selamat datang"
//!
//! [settings]
//! approaching_mins = 10
//! city_id = "1301"
//! ```
//!
//! ## Synced settings
//!
//! Settings arrive as a flat JSON object. Values may be numbers or numeric strings
//! and every field is sanitized on its own (see [`validation`]): durations are kept
//! within 1-60 minutes, adjustments within ±30 minutes, and an unusable field falls
//! back to its default without affecting its neighbours.

pub mod builder;
pub mod loading;
pub mod validation;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::*;
use crate::schedule::EventKey;
use validation::*;

pub use builder::create_default_config;
pub use loading::{get_config_path, load, load_from_path, set_config_dir};

/// Synced engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub approaching_mins: u32,
    pub adzan_duration: u32,
    pub iqamah_duration: u32,
    pub sholat_duration: u32,
    /// Friday midday prayer length; 0 uses `sholat_duration`.
    pub sholat_duration_friday: u32,
    /// Per-event adzan lengths indexed by [`EventKey::index`]; 0 uses the global value.
    pub adzan_overrides: [u32; 6],
    /// Per-event iqamah lengths; 0 uses the global value.
    pub iqamah_overrides: [u32; 6],
    /// Signed minute adjustments indexed by [`EventKey::index`].
    pub adjustments: [i32; 6],
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city_id: Option<String>,
    pub limit_slide: u32,
    pub limit_video: u32,
    pub limit_campaign: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            approaching_mins: DEFAULT_APPROACHING_MINS,
            adzan_duration: DEFAULT_ADZAN_DURATION,
            iqamah_duration: DEFAULT_IQAMAH_DURATION,
            sholat_duration: DEFAULT_SHOLAT_DURATION,
            sholat_duration_friday: 0,
            adzan_overrides: [0; 6],
            iqamah_overrides: [0; 6],
            adjustments: [0; 6],
            latitude: None,
            longitude: None,
            city_id: None,
            limit_slide: DEFAULT_LIMIT_SLIDE,
            limit_video: DEFAULT_LIMIT_VIDEO,
            limit_campaign: DEFAULT_LIMIT_CAMPAIGN,
        }
    }
}

impl Configuration {
    /// Build a record from a settings object, defaulting every absent field.
    pub fn from_settings(settings: &Map<String, Value>) -> Self {
        Self::default().merged(settings)
    }

    /// Return a copy with every field present in `patch` replaced.
    ///
    /// Absent fields keep their current values. A present but unusable value resets
    /// that field to its default.
    pub fn merged(&self, patch: &Map<String, Value>) -> Self {
        let mut next = self.clone();
        let int = |key: &str| patch.get(key).map(read_integer);

        if let Some(raw) = int("approaching_mins") {
            next.approaching_mins = sanitize_duration(raw, DEFAULT_APPROACHING_MINS);
        }
        if let Some(raw) = int("adzan_duration") {
            next.adzan_duration = sanitize_duration(raw, DEFAULT_ADZAN_DURATION);
        }
        if let Some(raw) = int("iqamah_duration") {
            next.iqamah_duration = sanitize_duration(raw, DEFAULT_IQAMAH_DURATION);
        }
        if let Some(raw) = int("sholat_duration") {
            next.sholat_duration = sanitize_duration(raw, DEFAULT_SHOLAT_DURATION);
        }
        if let Some(raw) = int("sholat_duration_friday") {
            next.sholat_duration_friday = sanitize_override(raw);
        }

        for event in EventKey::ALL {
            let i = event.index();
            if let Some(raw) = int(&format!("adj_{}", event.key())) {
                next.adjustments[i] = sanitize_adjustment(raw);
            }
            if let Some(raw) = int(&format!("adzan_duration_{}", event.key())) {
                next.adzan_overrides[i] = sanitize_override(raw);
            }
            if let Some(raw) = int(&format!("iqamah_duration_{}", event.key())) {
                next.iqamah_overrides[i] = sanitize_override(raw);
            }
        }

        if let Some(value) = patch.get("latitude") {
            next.latitude = sanitize_latitude(read_float(value));
        }
        if let Some(value) = patch.get("longitude") {
            next.longitude = sanitize_longitude(read_float(value));
        }
        if let Some(value) = patch.get("city_id") {
            next.city_id = read_identifier(value);
        }

        if let Some(raw) = int("limit_slide") {
            next.limit_slide = sanitize_limit(raw, DEFAULT_LIMIT_SLIDE);
        }
        if let Some(raw) = int("limit_video") {
            next.limit_video = sanitize_limit(raw, DEFAULT_LIMIT_VIDEO);
        }
        if let Some(raw) = int("limit_campaign") {
            next.limit_campaign = sanitize_limit(raw, DEFAULT_LIMIT_CAMPAIGN);
        }

        next
    }

    /// Both coordinates, when configured and in range.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    pub fn adjustment(&self, event: EventKey) -> i32 {
        self.adjustments[event.index()]
    }

    pub fn adzan_minutes(&self, event: EventKey) -> u32 {
        non_zero_or(self.adzan_overrides[event.index()], self.adzan_duration)
    }

    pub fn iqamah_minutes(&self, event: EventKey) -> u32 {
        non_zero_or(self.iqamah_overrides[event.index()], self.iqamah_duration)
    }

    /// Congregation length, using the Friday override for the midday prayer.
    pub fn sholat_minutes(&self, event: EventKey, is_friday: bool) -> u32 {
        if is_friday && event == EventKey::Dhuhr {
            non_zero_or(self.sholat_duration_friday, self.sholat_duration)
        } else {
            self.sholat_duration
        }
    }
}

fn non_zero_or(value: u32, fallback: u32) -> u32 {
    if value == 0 { fallback } else { value }
}

/// The live configuration plus a version bumped on every effective change.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    current: Configuration,
    version: u64,
}

impl ConfigStore {
    pub fn new(initial: Configuration) -> Self {
        Self {
            current: initial,
            version: 0,
        }
    }

    pub fn current(&self) -> &Configuration {
        &self.current
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Merge a settings response and swap the complete record in.
    ///
    /// Returns `true` when the record changed (and the version was bumped).
    pub fn merge(&mut self, patch: &Map<String, Value>) -> bool {
        let next = self.current.merged(patch);
        if next == self.current {
            return false;
        }
        self.current = next;
        self.version += 1;
        true
    }
}

/// Identity shown in the display header. Fixed for the lifetime of the process.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteIdentity {
    pub name: String,
    pub description: String,
    pub address: String,
    pub logo_url: String,
    /// Static running-text message used when the feed cannot be fetched.
    pub running_text: String,
}

/// Local bootstrap file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapConfig {
    pub rest_url: Option<String>,
    pub lookup_url: Option<String>,
    /// Shell command run when the adzan stage begins.
    pub cue_command: Option<String>,
    pub status_file: Option<PathBuf>,
    pub image_duration: Option<u64>,
    pub campaign_duration: Option<u64>,
    pub video_fallback: Option<u64>,
    #[serde(default)]
    pub site: SiteIdentity,
    #[serde(default)]
    pub settings: toml::Table,
}

impl BootstrapConfig {
    pub fn rest_url(&self) -> &str {
        self.rest_url.as_deref().unwrap_or(DEFAULT_REST_URL)
    }

    pub fn lookup_url(&self) -> &str {
        self.lookup_url.as_deref().unwrap_or(DEFAULT_LOOKUP_URL)
    }

    pub fn slide_durations(&self) -> SlideDurations {
        SlideDurations {
            image: self
                .image_duration
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_IMAGE_DURATION),
            campaign: self
                .campaign_duration
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CAMPAIGN_DURATION),
            video_fallback: self
                .video_fallback
                .map(Duration::from_secs)
                .unwrap_or(VIDEO_FALLBACK_DURATION),
        }
    }

    /// Status file path, defaulting to the user runtime directory.
    pub fn status_path(&self) -> PathBuf {
        self.status_file.clone().unwrap_or_else(|| {
            dirs::runtime_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("mrty-tv")
                .join("display.json")
        })
    }

    /// The `[settings]` table parsed with the same rules as a sync response.
    pub fn initial_configuration(&self) -> Configuration {
        match serde_json::to_value(&self.settings) {
            Ok(Value::Object(map)) => Configuration::from_settings(&map),
            _ => Configuration::default(),
        }
    }
}

/// On-screen time per playlist item type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideDurations {
    pub image: Duration,
    pub campaign: Duration,
    pub video_fallback: Duration,
}

impl Default for SlideDurations {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE_DURATION,
            campaign: DEFAULT_CAMPAIGN_DURATION,
            video_fallback: VIDEO_FALLBACK_DURATION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_from_settings_defaults_missing_fields() {
        let config = Configuration::from_settings(&Map::new());
        assert_eq!(config, Configuration::default());
        assert_eq!(config.approaching_mins, 10);
        assert_eq!(config.limit_video, 1);
    }

    #[test]
    fn test_bad_field_defaults_individually() {
        let config = Configuration::from_settings(&object(json!({
            "approaching_mins": "abc",
            "adzan_duration": "3",
            "iqamah_duration": 0,
            "adj_fajr": "-45",
            "adj_isha": 2,
            "latitude": "-6.2",
            "longitude": "nope",
        })));

        assert_eq!(config.approaching_mins, DEFAULT_APPROACHING_MINS);
        assert_eq!(config.adzan_duration, 3);
        assert_eq!(config.iqamah_duration, DEFAULT_IQAMAH_DURATION);
        assert_eq!(config.adjustment(EventKey::Fajr), -30);
        assert_eq!(config.adjustment(EventKey::Isha), 2);
        assert_eq!(config.latitude, Some(-6.2));
        assert_eq!(config.longitude, None);
        assert_eq!(config.coordinates(), None);
    }

    #[test]
    fn test_overrides_fall_back_to_global() {
        let config = Configuration::from_settings(&object(json!({
            "iqamah_duration": 10,
            "iqamah_duration_fajr": 20,
            "adzan_duration_maghrib": "4",
            "sholat_duration": 15,
            "sholat_duration_friday": 40,
        })));

        assert_eq!(config.iqamah_minutes(EventKey::Fajr), 20);
        assert_eq!(config.iqamah_minutes(EventKey::Asr), 10);
        assert_eq!(config.adzan_minutes(EventKey::Maghrib), 4);
        assert_eq!(config.adzan_minutes(EventKey::Isha), DEFAULT_ADZAN_DURATION);
        assert_eq!(config.sholat_minutes(EventKey::Dhuhr, true), 40);
        assert_eq!(config.sholat_minutes(EventKey::Dhuhr, false), 15);
        assert_eq!(config.sholat_minutes(EventKey::Asr, true), 15);
    }

    #[test]
    fn test_store_merge_keeps_unrelated_fields() {
        let mut store = ConfigStore::new(Configuration::from_settings(&object(json!({
            "approaching_mins": 7,
            "city_id": "1301",
        }))));

        assert!(store.merge(&object(json!({ "iqamah_duration": 12 }))));
        assert_eq!(store.version(), 1);
        assert_eq!(store.current().approaching_mins, 7);
        assert_eq!(store.current().iqamah_duration, 12);
        assert_eq!(store.current().city_id.as_deref(), Some("1301"));
    }

    #[test]
    fn test_store_merge_without_change_keeps_version() {
        let mut store = ConfigStore::default();
        assert!(!store.merge(&object(json!({ "adzan_duration": 2 }))));
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_bootstrap_settings_table_is_parsed_leniently() {
        let bootstrap: BootstrapConfig = toml::from_str(
            r#"
            rest_url = "https://example.org/wp-json/mrty-tv/v1"

            [settings]
            approaching_mins = "15"
            latitude = -7.25
            longitude = 112.75
            "#,
        )
        .unwrap();

        let config = bootstrap.initial_configuration();
        assert_eq!(config.approaching_mins, 15);
        assert_eq!(config.coordinates(), Some((-7.25, 112.75)));
        assert_eq!(bootstrap.slide_durations(), SlideDurations::default());
    }
}
