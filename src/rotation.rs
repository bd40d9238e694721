//! Content rotation.
//!
//! The [`RotationScheduler`] holds the playlist and a single pending deadline. It
//! never sleeps itself: the runtime waits on [`RotationScheduler::deadline`] and
//! calls [`RotationScheduler::fire_due`] when it passes. Pausing clears the deadline
//! and resuming arms a fresh one from the resume instant, so a stage that paused the
//! rotation never leaves a half-spent timer behind.

use serde::{Deserialize, Deserializer, Serialize};
use std::time::{Duration, Instant};

use crate::config::{Configuration, SlideDurations};
use crate::engine::EngineState;

/// Playlist entry as served by the content service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlaylistItem {
    Image(MediaSlide),
    Video(MediaSlide),
    Campaign(CampaignSlide),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MediaSlide {
    #[serde(default)]
    pub id: u64,
    pub src: String,
    #[serde(default)]
    pub title: String,
}

/// Fundraising campaign with optional payment details.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CampaignSlide {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub target: f64,
    #[serde(default)]
    pub collected: f64,
    #[serde(default)]
    pub progress: f64,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub qris: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub bank_name: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub account_number: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub account_holder: Option<String>,
}

/// Accept strings, numbers, `false` or `null`; blank values become `None`.
fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Image,
    Video,
    Campaign,
}

impl PlaylistItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            PlaylistItem::Image(_) => ItemKind::Image,
            PlaylistItem::Video(_) => ItemKind::Video,
            PlaylistItem::Campaign(_) => ItemKind::Campaign,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            PlaylistItem::Image(slide) | PlaylistItem::Video(slide) => &slide.title,
            PlaylistItem::Campaign(campaign) => &campaign.title,
        }
    }

    /// Media reference the renderer should warm before this item is shown.
    pub fn media_url(&self) -> Option<&str> {
        match self {
            PlaylistItem::Image(slide) | PlaylistItem::Video(slide) => Some(&slide.src),
            PlaylistItem::Campaign(campaign) => campaign.image.as_deref(),
        }
    }
}

/// Keep the first `limit` items of each kind, preserving order.
pub fn apply_limits(items: Vec<PlaylistItem>, config: &Configuration) -> Vec<PlaylistItem> {
    let mut counts = [0u32; 3];
    items
        .into_iter()
        .filter(|item| {
            let (slot, limit) = match item.kind() {
                ItemKind::Image => (0, config.limit_slide),
                ItemKind::Video => (1, config.limit_video),
                ItemKind::Campaign => (2, config.limit_campaign),
            };
            counts[slot] += 1;
            counts[slot] <= limit
        })
        .collect()
}

/// Advances the playlist on per-type timers.
#[derive(Debug)]
pub struct RotationScheduler {
    items: Vec<PlaylistItem>,
    index: usize,
    paused: bool,
    deadline: Option<Instant>,
    durations: SlideDurations,
}

impl RotationScheduler {
    pub fn new(durations: SlideDurations) -> Self {
        Self {
            items: Vec::new(),
            index: 0,
            paused: false,
            deadline: None,
            durations,
        }
    }

    pub fn items(&self) -> &[PlaylistItem] {
        &self.items
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn current(&self) -> Option<&PlaylistItem> {
        self.items.get(self.index)
    }

    /// The item after the current one, for prefetching.
    pub fn upcoming(&self) -> Option<&PlaylistItem> {
        if self.items.len() < 2 {
            return None;
        }
        self.items.get((self.index + 1) % self.items.len())
    }

    /// How long `item` stays on screen.
    pub fn duration_for(&self, item: &PlaylistItem) -> Duration {
        match item.kind() {
            ItemKind::Image => self.durations.image,
            ItemKind::Campaign => self.durations.campaign,
            ItemKind::Video => self.durations.video_fallback,
        }
    }

    /// Move to the next item, wrapping at the end.
    ///
    /// Returns `false` when the playlist is empty.
    pub fn advance(&mut self, now: Instant) -> bool {
        if self.items.is_empty() {
            return false;
        }
        self.index = (self.index + 1) % self.items.len();
        self.schedule_next(now);
        true
    }

    /// Cancel the pending timer, keeping the index.
    pub fn pause(&mut self) {
        self.paused = true;
        self.deadline = None;
    }

    /// Arm a fresh timer for the current item measured from `now`.
    pub fn resume(&mut self, now: Instant) {
        self.paused = false;
        self.schedule_next(now);
    }

    /// Show the item at `index`. Out-of-range indices are ignored.
    pub fn jump_to(&mut self, index: usize, now: Instant) -> bool {
        if index >= self.items.len() {
            return false;
        }
        self.index = index;
        self.schedule_next(now);
        true
    }

    /// Swap in a freshly fetched playlist.
    ///
    /// The index is kept when still in range, otherwise it restarts at the first
    /// item. A pending timer survives the swap only while the same item stays on
    /// screen; a different item, or an idle rotation, gets a fresh timer.
    pub fn replace_playlist(&mut self, items: Vec<PlaylistItem>, config: &Configuration, now: Instant) {
        let previous = self.current().cloned();
        self.items = apply_limits(items, config);

        if self.index >= self.items.len() {
            self.index = 0;
        }

        let same_item = previous.as_ref() == self.current();
        if self.items.is_empty() {
            self.deadline = None;
        } else if !self.paused && (self.deadline.is_none() || !same_item) {
            self.schedule_next(now);
        }
    }

    /// Follow the engine: pause for timed stages, resume once when they end.
    ///
    /// Returns `true` if the pause state changed.
    pub fn on_engine_state(&mut self, state: EngineState, now: Instant) -> bool {
        match (state.is_timed(), self.paused) {
            (true, false) => {
                self.pause();
                true
            }
            (false, true) => {
                self.resume(now);
                true
            }
            _ => false,
        }
    }

    /// The renderer finished playing the current video.
    pub fn on_playback_complete(&mut self, now: Instant) -> bool {
        let playing_video = self.current().is_some_and(|item| item.kind() == ItemKind::Video);
        if playing_video && !self.paused {
            self.advance(now)
        } else {
            false
        }
    }

    /// Advance if the pending deadline has passed.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => self.advance(now),
            _ => false,
        }
    }

    fn schedule_next(&mut self, now: Instant) {
        self.deadline = match (self.paused, self.current()) {
            (false, Some(item)) => Some(now + self.duration_for(item)),
            _ => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image(id: u64) -> PlaylistItem {
        PlaylistItem::Image(MediaSlide {
            id,
            src: format!("https://example.org/{id}.jpg"),
            title: format!("Slide {id}"),
        })
    }

    fn video(id: u64) -> PlaylistItem {
        PlaylistItem::Video(MediaSlide {
            id,
            src: format!("https://example.org/{id}.mp4"),
            title: String::new(),
        })
    }

    #[test]
    fn test_deserialize_tagged_items() {
        let items: Vec<PlaylistItem> = serde_json::from_value(json!([
            { "id": 1, "type": "image", "src": "a.jpg", "title": "A" },
            { "id": 2, "type": "video", "src": "b.mp4", "title": "B" },
            {
                "id": 3, "type": "campaign", "title": "Renovasi",
                "target": 100000000.0, "collected": 25000000.0, "progress": 25.0,
                "image": false, "qris": "", "bank_name": "BSI",
                "account_number": 7123456789u64, "account_holder": "DKM"
            }
        ]))
        .unwrap();

        assert_eq!(items[0].kind(), ItemKind::Image);
        assert_eq!(items[1].kind(), ItemKind::Video);
        let PlaylistItem::Campaign(campaign) = &items[2] else {
            panic!("expected campaign");
        };
        assert_eq!(campaign.image, None);
        assert_eq!(campaign.qris, None);
        assert_eq!(campaign.account_number.as_deref(), Some("7123456789"));
        assert_eq!(campaign.progress, 25.0);
    }

    #[test]
    fn test_advance_wraps_and_rearms() {
        let start = Instant::now();
        let mut rotation = RotationScheduler::new(SlideDurations::default());
        rotation.replace_playlist(vec![image(1), image(2)], &Configuration::default(), start);
        assert_eq!(rotation.deadline(), Some(start + Duration::from_secs(8)));

        let later = start + Duration::from_secs(8);
        assert!(rotation.fire_due(later));
        assert_eq!(rotation.index(), 1);
        assert!(rotation.fire_due(later + Duration::from_secs(8)));
        assert_eq!(rotation.index(), 0);
    }

    #[test]
    fn test_empty_playlist_is_inert() {
        let now = Instant::now();
        let mut rotation = RotationScheduler::new(SlideDurations::default());
        assert!(!rotation.advance(now));
        assert!(rotation.deadline().is_none());
        assert!(rotation.current().is_none());
        rotation.resume(now);
        assert!(rotation.deadline().is_none());
    }

    #[test]
    fn test_jump_to_rejects_out_of_range() {
        let now = Instant::now();
        let mut rotation = RotationScheduler::new(SlideDurations::default());
        rotation.replace_playlist(vec![image(1), image(2), image(3)], &Configuration::default(), now);

        assert!(rotation.jump_to(2, now));
        assert_eq!(rotation.index(), 2);
        assert!(!rotation.jump_to(3, now));
        assert_eq!(rotation.index(), 2);
    }

    #[test]
    fn test_video_uses_fallback_and_completion_signal() {
        let now = Instant::now();
        let mut rotation = RotationScheduler::new(SlideDurations::default());
        rotation.replace_playlist(vec![video(1), image(2)], &Configuration::default(), now);

        assert_eq!(rotation.deadline(), Some(now + Duration::from_secs(300)));
        assert!(rotation.on_playback_complete(now + Duration::from_secs(42)));
        assert_eq!(rotation.index(), 1);
        assert!(!rotation.on_playback_complete(now + Duration::from_secs(43)));
    }

    #[test]
    fn test_limits_keep_first_items_per_kind() {
        let config = Configuration {
            limit_slide: 2,
            limit_video: 0,
            ..Default::default()
        };
        let limited = apply_limits(vec![image(1), video(9), image(2), image(3)], &config);
        assert_eq!(limited, vec![image(1), image(2)]);
    }

    #[test]
    fn test_replace_playlist_clamps_index() {
        let now = Instant::now();
        let mut rotation = RotationScheduler::new(SlideDurations::default());
        let config = Configuration::default();
        rotation.replace_playlist(vec![image(1), image(2), image(3)], &config, now);
        rotation.jump_to(2, now);

        rotation.replace_playlist(vec![image(4)], &config, now);
        assert_eq!(rotation.index(), 0);
        assert!(rotation.deadline().is_some());

        rotation.replace_playlist(Vec::new(), &config, now);
        assert!(rotation.deadline().is_none());
    }

    #[test]
    fn test_replace_playlist_rearms_only_when_item_changes() {
        let start = Instant::now();
        let mut rotation = RotationScheduler::new(SlideDurations::default());
        let config = Configuration::default();
        rotation.replace_playlist(vec![image(1), image(2)], &config, start);

        // Same item on screen: the running timer is kept.
        let refetch = start + Duration::from_secs(3);
        rotation.replace_playlist(vec![image(1), image(3)], &config, refetch);
        assert_eq!(rotation.deadline(), Some(start + Duration::from_secs(8)));

        // A video now sits at the kept index and gets its own ceiling.
        let swapped = start + Duration::from_secs(5);
        rotation.replace_playlist(vec![video(7), image(3)], &config, swapped);
        assert_eq!(rotation.index(), 0);
        assert_eq!(rotation.deadline(), Some(swapped + Duration::from_secs(300)));
    }

    #[test]
    fn test_engine_states_pause_and_resume_once() {
        let now = Instant::now();
        let mut rotation = RotationScheduler::new(SlideDurations::default());
        rotation.replace_playlist(vec![image(1), image(2)], &Configuration::default(), now);

        assert!(rotation.on_engine_state(EngineState::Adzan, now));
        assert!(!rotation.on_engine_state(EngineState::Iqamah, now));
        assert!(rotation.is_paused());
        assert!(rotation.deadline().is_none());

        let resumed_at = now + Duration::from_secs(1500);
        assert!(rotation.on_engine_state(EngineState::Normal, resumed_at));
        assert!(!rotation.on_engine_state(EngineState::Approaching, resumed_at));
        assert_eq!(rotation.deadline(), Some(resumed_at + Duration::from_secs(8)));
    }
}
