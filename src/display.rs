//! Display state published for the renderer.
//!
//! The terminal does not draw anything itself. Once per tick it serializes a
//! [`DisplayState`] snapshot to a JSON status file, which the renderer polls.
//! The file is replaced atomically so a reader never sees a partial write.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::SiteIdentity;
use crate::constants::LOADING_TIME;
use crate::engine::{EngineState, PrayerEngine, Transition};
use crate::remote::FeedItem;
use crate::rotation::{PlaylistItem, RotationScheduler};
use crate::schedule::{DailySchedule, EventKey};
use crate::time_source::ClockFace;

/// One row of the prayer-time list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrayerRow {
    pub key: EventKey,
    pub name: &'static str,
    pub icon: &'static str,
    /// `HH:MM`, or `--:--` while the schedule is loading.
    pub time: String,
    pub is_next: bool,
    pub is_current: bool,
}

/// What the slide area shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideView {
    pub index: usize,
    pub total: usize,
    pub paused: bool,
    pub item: Option<PlaylistItem>,
    /// Next item, so the renderer can prefetch its media.
    pub upcoming: Option<PlaylistItem>,
}

/// Complete snapshot of everything on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayState {
    pub clock: ClockFace,
    pub simulated: bool,
    pub site: SiteIdentity,
    pub state: EngineState,
    pub current_event: Option<EventKey>,
    pub next_event: Option<EventKey>,
    pub countdown: String,
    pub label: String,
    pub state_ends_at: Option<NaiveDateTime>,
    pub prayers: Vec<PrayerRow>,
    pub slide: SlideView,
    pub running_text: Vec<FeedItem>,
    pub config_version: u64,
}

/// Borrowed inputs for [`DisplayState::capture`].
pub struct DisplaySources<'a> {
    pub now: NaiveDateTime,
    pub simulated: bool,
    pub site: &'a SiteIdentity,
    pub engine: &'a PrayerEngine,
    pub schedule: Option<&'a DailySchedule>,
    pub rotation: &'a RotationScheduler,
    pub feed: &'a [FeedItem],
    pub config_version: u64,
}

impl DisplayState {
    pub fn capture(sources: DisplaySources<'_>) -> Self {
        let engine = sources.engine;

        Self {
            clock: ClockFace::from_instant(&sources.now),
            simulated: sources.simulated,
            site: sources.site.clone(),
            state: engine.state(),
            current_event: engine.current_event(),
            next_event: engine.next_event(),
            countdown: engine.countdown().to_string(),
            label: engine.label().to_string(),
            state_ends_at: engine.state_ends_at(),
            prayers: prayer_rows(sources.schedule, engine),
            slide: SlideView {
                index: sources.rotation.index(),
                total: sources.rotation.items().len(),
                paused: sources.rotation.is_paused(),
                item: sources.rotation.current().cloned(),
                upcoming: sources.rotation.upcoming().cloned(),
            },
            running_text: sources.feed.to_vec(),
            config_version: sources.config_version,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize display state")
    }
}

/// Build the six prayer rows. Times show placeholders until a schedule exists.
pub fn prayer_rows(schedule: Option<&DailySchedule>, engine: &PrayerEngine) -> Vec<PrayerRow> {
    EventKey::ALL
        .iter()
        .map(|&key| PrayerRow {
            key,
            name: key.display_name(),
            icon: key.icon(),
            time: schedule
                .map(|s| s.time(key).format("%H:%M").to_string())
                .unwrap_or_else(|| LOADING_TIME.to_string()),
            is_next: schedule.is_some() && engine.next_event() == Some(key),
            is_current: engine.current_event() == Some(key),
        })
        .collect()
}

/// Writes snapshots to the status file.
pub struct StatusWriter {
    path: Option<PathBuf>,
    failed: bool,
}

impl StatusWriter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            failed: false,
        }
    }

    /// A writer that drops every snapshot.
    pub fn disabled() -> Self {
        Self {
            path: None,
            failed: false,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write `state`, logging the first failure only.
    pub fn publish(&mut self, state: &DisplayState) {
        let Some(path) = &self.path else {
            return;
        };

        match write_atomically(path, state) {
            Ok(()) => {
                if self.failed {
                    log_info!("Status file writable again: {}", path.display());
                    self.failed = false;
                }
            }
            Err(e) => {
                if !self.failed {
                    log_warning!("Cannot write status file: {e:#}");
                    self.failed = true;
                }
            }
        }
    }
}

fn write_atomically(path: &Path, state: &DisplayState) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let json = state.to_json()?;
    let mut file = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    file.write_all(json.as_bytes())
        .context("Failed to write display state")?;
    file.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Log an engine transition in the structured console style.
pub fn log_transition(transition: &Transition, engine: &PrayerEngine) {
    let event = transition.event.map(EventKey::display_name).unwrap_or_default();

    match transition.to {
        EngineState::Normal => {
            if transition.from.is_timed() {
                log_block_start!("Completed {} {}", transition.from.display_name().to_lowercase(), event);
            }
            log_block_start!("Back to normal display");
        }
        EngineState::Approaching => {
            log_block_start!("{}", engine.label());
            log_indented!("Countdown {}", engine.countdown());
        }
        EngineState::Adzan | EngineState::Iqamah | EngineState::Sholat => {
            log_block_start!("Entering {} {}", transition.to.display_name().to_lowercase(), event);
            if let Some(ends_at) = engine.state_ends_at() {
                log_indented!("Until {}", ends_at.format("%H:%M:%S"));
            }
        }
    }
}

/// Log the schedule once after it has been installed.
pub fn log_schedule(schedule: &DailySchedule) {
    let (lat, lon) = schedule.coordinates();
    log_block_start!("Prayer times for {}", schedule.date().format("%Y-%m-%d"));
    log_indented!("Coordinates {lat:.4}°, {lon:.4}°");
    for key in EventKey::ALL {
        log_indented!("{:<8} {}", key.display_name(), schedule.time(key).format("%H:%M"));
    }
}

/// Log the slide that is now on screen.
pub fn log_slide(rotation: &RotationScheduler) {
    if let Some(item) = rotation.current() {
        log_debug!(
            "Slide {}/{}: {}",
            rotation.index() + 1,
            rotation.items().len(),
            if item.title().is_empty() { "(untitled)" } else { item.title() }
        );
    }
}
