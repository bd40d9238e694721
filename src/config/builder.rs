//! Default bootstrap file creation.
//!
//! The generated file is commented and column-aligned so an installer can fill in
//! the content service URL and location without looking anything up.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::constants::*;

/// Write a default bootstrap file at `path`, creating parent directories.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let content = default_config_content();
    fs::write(path, content)
        .with_context(|| format!("Failed to write default config to {}", path.display()))?;

    log_block_start!("Created default configuration");
    log_indented!("{}", path.display());
    log_indented!("Set rest_url and your location before deploying");

    Ok(())
}

/// Render the default bootstrap file.
pub fn default_config_content() -> String {
    let header = ConfigBuilder::new()
        .add_section("Content service")
        .add_setting(
            "rest_url",
            &format!("\"{DEFAULT_REST_URL}\""),
            "Base URL of the mrty-tv REST namespace",
        )
        .add_setting(
            "lookup_url",
            &format!("\"{DEFAULT_LOOKUP_URL}\""),
            "Coordinate lookup, {id} is replaced by city_id",
        )
        .add_section("Rotation")
        .add_setting(
            "image_duration",
            &DEFAULT_IMAGE_DURATION.as_secs().to_string(),
            "Seconds per image slide",
        )
        .add_setting(
            "campaign_duration",
            &DEFAULT_CAMPAIGN_DURATION.as_secs().to_string(),
            &format!("Seconds per campaign slide ({MINIMUM_CAMPAIGN_SECS}-{MAXIMUM_CAMPAIGN_SECS})"),
        )
        .add_setting(
            "video_fallback",
            &VIDEO_FALLBACK_DURATION.as_secs().to_string(),
            "Advance a video after this many seconds without completion",
        )
        .build();

    let settings = ConfigBuilder::new()
        .add_table("settings")
        .add_setting(
            "approaching_mins",
            &DEFAULT_APPROACHING_MINS.to_string(),
            "Minutes before an event to show the approaching banner (1-60)",
        )
        .add_setting(
            "adzan_duration",
            &DEFAULT_ADZAN_DURATION.to_string(),
            "Adzan stage length in minutes (1-60)",
        )
        .add_setting(
            "iqamah_duration",
            &DEFAULT_IQAMAH_DURATION.to_string(),
            "Iqamah stage length in minutes (1-60)",
        )
        .add_setting(
            "sholat_duration",
            &DEFAULT_SHOLAT_DURATION.to_string(),
            "Prayer stage length in minutes (1-60)",
        )
        .add_setting(
            "sholat_duration_friday",
            "0",
            "Friday midday prayer length (0 = use sholat_duration)",
        )
        .add_setting(
            "latitude",
            &format!("{FALLBACK_LATITUDE:.4}"),
            "Latitude in degrees (-90 to +90)",
        )
        .add_setting(
            "longitude",
            &format!("{FALLBACK_LONGITUDE:.4}"),
            "Longitude in degrees (-180 to +180)",
        )
        .add_setting(
            "limit_slide",
            &DEFAULT_LIMIT_SLIDE.to_string(),
            "Maximum image slides in the playlist",
        )
        .add_setting(
            "limit_video",
            &DEFAULT_LIMIT_VIDEO.to_string(),
            "Maximum videos in the playlist",
        )
        .add_setting(
            "limit_campaign",
            &DEFAULT_LIMIT_CAMPAIGN.to_string(),
            "Maximum campaigns in the playlist",
        )
        .build();

    let site = ConfigBuilder::new()
        .add_table("site")
        .add_setting("name", "\"\"", "Shown in the header")
        .add_setting("description", "\"\"", "Shown under the name")
        .add_setting("address", "\"\"", "Shown in the footer")
        .add_setting("logo_url", "\"\"", "Header logo")
        .add_setting(
            "running_text",
            "\"\"",
            "Ticker message used when the feed is unavailable",
        )
        .build();

    format!("{header}\n\n{site}\n\n{settings}\n")
}

/// Builds aligned `key = value  # comment` blocks.
struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

enum ConfigEntry {
    Heading(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Comment-style section marker for top-level keys.
    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry::Heading(format!("#[{title}]")));
        self
    }

    /// Real TOML table header.
    fn add_table(mut self, name: &str) -> Self {
        self.entries.push(ConfigEntry::Heading(format!("[{name}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn build(self) -> String {
        let width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                ConfigEntry::Setting { line, .. } => Some(line.len()),
                ConfigEntry::Heading(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut lines = Vec::new();
        for (i, entry) in self.entries.into_iter().enumerate() {
            match entry {
                ConfigEntry::Heading(heading) => {
                    if i > 0 {
                        lines.push(String::new());
                    }
                    lines.push(heading);
                }
                ConfigEntry::Setting { line, comment } => {
                    let padding = " ".repeat(width - line.len());
                    lines.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        lines.join("\n")
    }
}
