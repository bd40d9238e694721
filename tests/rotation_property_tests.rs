use mrty_tv::config::{Configuration, SlideDurations};
use mrty_tv::engine::EngineState;
use mrty_tv::rotation::{MediaSlide, PlaylistItem, RotationScheduler};
use proptest::prelude::*;
use std::time::{Duration, Instant};

fn image(id: u64) -> PlaylistItem {
    PlaylistItem::Image(MediaSlide {
        id,
        src: format!("https://example.org/{id}.jpg"),
        title: format!("Slide {id}"),
    })
}

fn scheduler_with(len: u64, now: Instant) -> RotationScheduler {
    let mut rotation = RotationScheduler::new(SlideDurations::default());
    let config = Configuration {
        limit_slide: 100,
        ..Default::default()
    };
    rotation.replace_playlist((1..=len).map(image).collect(), &config, now);
    rotation
}

proptest! {
    /// After n advances the index is n mod len.
    #[test]
    fn test_advance_wraps_modulo_length(len in 1u64..12, advances in 0usize..100) {
        let now = Instant::now();
        let mut rotation = scheduler_with(len, now);

        for _ in 0..advances {
            prop_assert!(rotation.advance(now));
        }

        prop_assert_eq!(rotation.index(), advances % len as usize);
    }

    /// Resuming arms a fresh full-length timer measured from the resume instant,
    /// however long the pause lasted.
    #[test]
    fn test_resume_is_relative_to_resume_instant(
        elapsed_before_pause in 0u64..8,
        pause_secs in 0u64..3600,
    ) {
        let start = Instant::now();
        let mut rotation = scheduler_with(3, start);

        let paused_at = start + Duration::from_secs(elapsed_before_pause);
        prop_assert!(rotation.on_engine_state(EngineState::Adzan, paused_at));
        prop_assert!(rotation.is_paused());
        prop_assert_eq!(rotation.deadline(), None);

        // Later timed stages keep it paused without re-arming anything.
        prop_assert!(!rotation.on_engine_state(EngineState::Sholat, paused_at));

        let resumed_at = paused_at + Duration::from_secs(pause_secs);
        prop_assert!(rotation.on_engine_state(EngineState::Normal, resumed_at));
        prop_assert_eq!(rotation.deadline(), Some(resumed_at + SlideDurations::default().image));
        prop_assert_eq!(rotation.index(), 0);
    }
}

#[test]
fn test_timer_firing_advances_once_per_deadline() {
    let start = Instant::now();
    let mut rotation = scheduler_with(3, start);
    let deadline = rotation.deadline().unwrap();

    assert!(!rotation.fire_due(deadline - Duration::from_millis(1)));
    assert!(rotation.fire_due(deadline));
    assert_eq!(rotation.index(), 1);
    assert!(!rotation.fire_due(deadline));
}

#[test]
fn test_paused_rotation_ignores_playback_complete() {
    let start = Instant::now();
    let mut rotation = RotationScheduler::new(SlideDurations::default());
    rotation.replace_playlist(
        vec![
            PlaylistItem::Video(MediaSlide {
                id: 1,
                src: "a.mp4".to_string(),
                title: String::new(),
            }),
            image(2),
        ],
        &Configuration::default(),
        start,
    );

    rotation.pause();
    assert!(!rotation.on_playback_complete(start));
    assert_eq!(rotation.index(), 0);

    rotation.resume(start);
    assert!(rotation.on_playback_complete(start));
    assert_eq!(rotation.index(), 1);
}
