//! Prayer state machine.
//!
//! The engine is re-evaluated every second against the wall clock. It owns no
//! timers: each [`PrayerEngine::tick`] compares `now` against absolute instants (the
//! next event, or the deadline of the current timed stage) so a late or skipped
//! tick never stretches a stage.
//!
//! ```text
//! NORMAL ──(≤ approaching window)──▶ APPROACHING ──(event time)──▶ ADZAN
//!   ▲                                   │ Sunrise                      │
//!   │◀──────────────────────────────────┘                              ▼
//!   └──────────────── SHOLAT ◀──────────────────────────────────── IQAMAH
//! ```
//!
//! Each stage deadline is chained from the previous deadline, and the stage lengths
//! are read from the configuration at the moment the stage begins.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::Serialize;

use crate::config::Configuration;
use crate::constants::{EVENT_TOLERANCE_SECONDS, LOADING_COUNTDOWN};
use crate::schedule::{DailySchedule, EventKey};

/// Externally visible engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineState {
    Normal,
    Approaching,
    Adzan,
    Iqamah,
    Sholat,
}

impl EngineState {
    /// Stages during which content rotation is suspended.
    pub fn is_timed(self) -> bool {
        matches!(self, EngineState::Adzan | EngineState::Iqamah | EngineState::Sholat)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            EngineState::Normal => "Normal",
            EngineState::Approaching => "Approaching",
            EngineState::Adzan => "Adzan",
            EngineState::Iqamah => "Iqamah",
            EngineState::Sholat => "Sholat",
        }
    }
}

/// Internal phase. Timed phases carry their own deadline, so a deadline exists
/// exactly when the state is timed.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Normal,
    Approaching { target: EventKey },
    Adzan { event: EventKey, ends_at: NaiveDateTime },
    Iqamah { event: EventKey, ends_at: NaiveDateTime },
    Sholat { event: EventKey, ends_at: NaiveDateTime },
}

impl Phase {
    fn state(self) -> EngineState {
        match self {
            Phase::Normal => EngineState::Normal,
            Phase::Approaching { .. } => EngineState::Approaching,
            Phase::Adzan { .. } => EngineState::Adzan,
            Phase::Iqamah { .. } => EngineState::Iqamah,
            Phase::Sholat { .. } => EngineState::Sholat,
        }
    }

    fn ends_at(self) -> Option<NaiveDateTime> {
        match self {
            Phase::Adzan { ends_at, .. }
            | Phase::Iqamah { ends_at, .. }
            | Phase::Sholat { ends_at, .. } => Some(ends_at),
            Phase::Normal | Phase::Approaching { .. } => None,
        }
    }
}

/// One state change observed during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: EngineState,
    pub to: EngineState,
    pub event: Option<EventKey>,
}

impl Transition {
    /// Whether this transition starts an adzan (the audible cue moment).
    pub fn enters_adzan(&self) -> bool {
        self.to == EngineState::Adzan && self.from != EngineState::Adzan
    }
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No schedule yet; nothing was evaluated.
    Loading,
    /// The loaded schedule is for another date; evaluation is suspended until a
    /// schedule for `today` is installed.
    RecomputeNeeded { today: NaiveDate },
    Evaluated { transitions: Vec<Transition> },
}

/// The prayer-time state machine.
#[derive(Debug, Clone)]
pub struct PrayerEngine {
    phase: Phase,
    current_event: Option<EventKey>,
    next_event: Option<EventKey>,
    countdown: String,
    label: String,
    /// Instant of the last event that fired, so it fires at most once.
    last_fired: Option<NaiveDateTime>,
}

impl Default for PrayerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PrayerEngine {
    pub fn new() -> Self {
        Self {
            phase: Phase::Normal,
            current_event: None,
            next_event: None,
            countdown: LOADING_COUNTDOWN.to_string(),
            label: String::new(),
            last_fired: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.phase.state()
    }

    pub fn current_event(&self) -> Option<EventKey> {
        self.current_event
    }

    pub fn next_event(&self) -> Option<EventKey> {
        self.next_event
    }

    /// `HH:MM:SS`, or `--:--:--` before the first schedule loads.
    pub fn countdown(&self) -> &str {
        &self.countdown
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Deadline of the current timed stage.
    pub fn state_ends_at(&self) -> Option<NaiveDateTime> {
        self.phase.ends_at()
    }

    /// Evaluate the machine at `now` (local wall-clock time).
    pub fn tick(
        &mut self,
        now: NaiveDateTime,
        schedule: Option<&DailySchedule>,
        config: &Configuration,
    ) -> TickOutcome {
        let Some(schedule) = schedule else {
            self.countdown = LOADING_COUNTDOWN.to_string();
            return TickOutcome::Loading;
        };

        if schedule.date() != now.date() {
            return TickOutcome::RecomputeNeeded { today: now.date() };
        }

        let mut transitions = Vec::new();

        // A long gap can expire several timed stages at once.
        while let Some(ends_at) = self.phase.ends_at()
            && now >= ends_at
        {
            let (from, event) = (self.phase.state(), self.current_event);
            self.advance_timed_stage(ends_at, config);
            transitions.push(Transition {
                from,
                to: self.phase.state(),
                event,
            });
        }

        if !self.phase.state().is_timed() {
            self.evaluate_untimed(now, schedule, config, &mut transitions);
        }

        self.next_event = Some(schedule.next_after(now).0);
        self.refresh_display(now, schedule);

        TickOutcome::Evaluated { transitions }
    }

    fn advance_timed_stage(&mut self, ended_at: NaiveDateTime, config: &Configuration) {
        self.phase = match self.phase {
            Phase::Adzan { event, .. } => Phase::Iqamah {
                event,
                ends_at: ended_at + minutes(config.iqamah_minutes(event)),
            },
            Phase::Iqamah { event, .. } => {
                let is_friday = ended_at.weekday() == Weekday::Fri;
                Phase::Sholat {
                    event,
                    ends_at: ended_at + minutes(config.sholat_minutes(event, is_friday)),
                }
            }
            Phase::Sholat { .. } => {
                self.current_event = None;
                Phase::Normal
            }
            untimed => untimed,
        };
    }

    fn evaluate_untimed(
        &mut self,
        now: NaiveDateTime,
        schedule: &DailySchedule,
        config: &Configuration,
        transitions: &mut Vec<Transition>,
    ) {
        let from = self.phase.state();
        let window = i64::from(config.approaching_mins) * 60;

        if let Phase::Approaching { target } = self.phase {
            // Re-resolve against the current schedule; it may have been recomputed.
            let target_at =
                schedule.occurrence_after(target, now - Duration::seconds(EVENT_TOLERANCE_SECONDS));
            let remaining = (target_at - now).num_seconds();

            if remaining <= 0 {
                self.fire(target, target_at, now, config, from, transitions);
                return;
            }
            if remaining <= window {
                return;
            }
            // The target moved out of the window (missed or rescheduled).
            self.phase = Phase::Normal;
            self.current_event = None;
            transitions.push(Transition {
                from,
                to: EngineState::Normal,
                event: None,
            });
        }

        if let Some((event, at)) = self.due_event(now, schedule) {
            self.fire(event, at, now, config, EngineState::Normal, transitions);
            return;
        }

        let (next, next_at) = schedule.next_after(now);
        let remaining = (next_at - now).num_seconds();
        if remaining > 0 && remaining <= window {
            self.phase = Phase::Approaching { target: next };
            self.current_event = Some(next);
            transitions.push(Transition {
                from: EngineState::Normal,
                to: EngineState::Approaching,
                event: Some(next),
            });
        }
    }

    /// An event whose time passed less than the tolerance ago and that has not fired.
    fn due_event(&self, now: NaiveDateTime, schedule: &DailySchedule) -> Option<(EventKey, NaiveDateTime)> {
        EventKey::ALL.into_iter().find_map(|event| {
            let at = schedule.at(event);
            let elapsed = (now - at).num_seconds();
            let due = (0..EVENT_TOLERANCE_SECONDS).contains(&elapsed) && self.last_fired != Some(at);
            due.then_some((event, at))
        })
    }

    fn fire(
        &mut self,
        event: EventKey,
        event_at: NaiveDateTime,
        now: NaiveDateTime,
        config: &Configuration,
        from: EngineState,
        transitions: &mut Vec<Transition>,
    ) {
        if self.last_fired == Some(event_at) {
            self.phase = Phase::Normal;
            self.current_event = None;
            if from != EngineState::Normal {
                transitions.push(Transition {
                    from,
                    to: EngineState::Normal,
                    event: None,
                });
            }
            return;
        }
        self.last_fired = Some(event_at);
        self.current_event = Some(event);

        // Adzan runs its full length from entry; later stages chain off its deadline.
        self.phase = if event.has_congregation() {
            Phase::Adzan {
                event,
                ends_at: now + minutes(config.adzan_minutes(event)),
            }
        } else {
            Phase::Normal
        };

        transitions.push(Transition {
            from,
            to: self.phase.state(),
            event: Some(event),
        });
    }

    fn refresh_display(&mut self, now: NaiveDateTime, schedule: &DailySchedule) {
        let (label, remaining) = match self.phase {
            Phase::Normal => {
                let (next, at) = schedule.next_after(now);
                (format!("Menuju {}", next.display_name()), at - now)
            }
            Phase::Approaching { target } => {
                let at = schedule.occurrence_after(target, now - Duration::seconds(EVENT_TOLERANCE_SECONDS));
                (format!("Menuju Waktu Sholat {}", target.display_name()), at - now)
            }
            Phase::Adzan { event, ends_at } => (format!("Adzan {}", event.display_name()), ends_at - now),
            Phase::Iqamah { event, ends_at } => (format!("Iqamah {}", event.display_name()), ends_at - now),
            Phase::Sholat { event, ends_at } => (
                format!("Sholat {} Sedang Berlangsung", event.display_name()),
                ends_at - now,
            ),
        };

        self.label = label;
        self.countdown = format_countdown(remaining.num_seconds());
    }
}

fn minutes(value: u32) -> Duration {
    Duration::minutes(i64::from(value))
}

/// Format seconds as zero-padded `HH:MM:SS`, flooring negatives at zero.
pub fn format_countdown(total_seconds: i64) -> String {
    let total = total_seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn schedule_on(date: NaiveDate) -> DailySchedule {
        DailySchedule::new(
            date,
            0,
            (0.0, 0.0),
            [hm(4, 30), hm(5, 45), hm(12, 0), hm(15, 15), hm(18, 0), hm(19, 15)],
        )
    }

    fn thursday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(0), "00:00:00");
        assert_eq!(format_countdown(3661), "01:01:01");
        assert_eq!(format_countdown(-5), "00:00:00");
        assert_eq!(format_countdown(86_399), "23:59:59");
    }

    #[test]
    fn test_loading_without_schedule() {
        let mut engine = PrayerEngine::new();
        let now = thursday().and_time(hm(9, 0));
        assert_eq!(engine.tick(now, None, &Configuration::default()), TickOutcome::Loading);
        assert_eq!(engine.countdown(), "--:--:--");
        assert_eq!(engine.state(), EngineState::Normal);
    }

    #[test]
    fn test_normal_countdown_and_label() {
        let mut engine = PrayerEngine::new();
        let schedule = schedule_on(thursday());
        engine.tick(thursday().and_time(hm(9, 0)), Some(&schedule), &Configuration::default());

        assert_eq!(engine.state(), EngineState::Normal);
        assert_eq!(engine.next_event(), Some(EventKey::Dhuhr));
        assert_eq!(engine.countdown(), "03:00:00");
        assert_eq!(engine.label(), "Menuju Dzuhur");
    }

    #[test]
    fn test_countdown_wraps_past_midnight() {
        let mut engine = PrayerEngine::new();
        let schedule = schedule_on(thursday());
        engine.tick(thursday().and_time(hm(22, 0)), Some(&schedule), &Configuration::default());

        assert_eq!(engine.next_event(), Some(EventKey::Fajr));
        assert_eq!(engine.countdown(), "06:30:00");
    }

    #[test]
    fn test_sunrise_returns_to_normal_once() {
        let mut engine = PrayerEngine::new();
        let schedule = schedule_on(thursday());
        let config = Configuration::default();

        engine.tick(thursday().and_time(hm(5, 40)), Some(&schedule), &config);
        assert_eq!(engine.state(), EngineState::Approaching);

        let outcome = engine.tick(thursday().and_time(hm(5, 45)), Some(&schedule), &config);
        assert_eq!(
            outcome,
            TickOutcome::Evaluated {
                transitions: vec![Transition {
                    from: EngineState::Approaching,
                    to: EngineState::Normal,
                    event: Some(EventKey::Sunrise),
                }]
            }
        );

        let later = thursday().and_time(hm(5, 45)) + Duration::seconds(1);
        let outcome = engine.tick(later, Some(&schedule), &config);
        assert_eq!(outcome, TickOutcome::Evaluated { transitions: vec![] });
        assert_eq!(engine.state(), EngineState::Normal);
        assert_eq!(engine.current_event(), Some(EventKey::Sunrise));
    }

    #[test]
    fn test_missed_approaching_target_drops_to_normal() {
        let mut engine = PrayerEngine::new();
        let schedule = schedule_on(thursday());
        let config = Configuration::default();

        engine.tick(thursday().and_time(hm(11, 55)), Some(&schedule), &config);
        assert_eq!(engine.state(), EngineState::Approaching);

        // The device slept through the event and its tolerance window.
        engine.tick(thursday().and_time(hm(12, 5)), Some(&schedule), &config);
        assert_eq!(engine.state(), EngineState::Normal);
        assert_eq!(engine.current_event(), None);
        assert_eq!(engine.next_event(), Some(EventKey::Asr));
    }

    #[test]
    fn test_late_tick_expires_several_stages() {
        let mut engine = PrayerEngine::new();
        let schedule = schedule_on(thursday());
        let config = Configuration::default();

        engine.tick(thursday().and_time(hm(12, 0)), Some(&schedule), &config);
        assert_eq!(engine.state(), EngineState::Adzan);

        // Adzan ends 12:02, iqamah 12:12; a tick at 12:20 lands in sholat.
        let outcome = engine.tick(thursday().and_time(hm(12, 20)), Some(&schedule), &config);
        let TickOutcome::Evaluated { transitions } = outcome else {
            panic!("expected evaluation");
        };
        assert_eq!(transitions.len(), 2);
        assert_eq!(engine.state(), EngineState::Sholat);
        assert_eq!(engine.state_ends_at(), Some(thursday().and_time(hm(12, 27))));
    }
}
