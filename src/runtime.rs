//! The terminal's event loop.
//!
//! [`Terminal`] owns every component and every timer. A single `select!` loop on a
//! current-thread runtime drives the 1 Hz engine tick, the rotation deadline, the
//! sync interval and the feed interval, and awaits whichever network or schedule
//! jobs are in flight. Jobs are owned futures; dropping one cancels its request.
//!
//! Nothing inside the loop is fatal. Failed jobs are logged and the previous data
//! stays on screen until the next attempt.

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::time::Instant;
use tokio::time::{MissedTickBehavior, interval, interval_at};
use tokio_util::sync::CancellationToken;

use crate::config::{BootstrapConfig, ConfigStore, Configuration, SiteIdentity, SlideDurations};
use crate::constants::{
    ENGINE_TICK_INTERVAL, FEED_REFRESH_INTERVAL, SYNC_INITIAL_DELAY, SYNC_INTERVAL,
};
use crate::cue::{self, AudibleCue};
use crate::display::{self, DisplaySources, DisplayState, StatusWriter};
use crate::engine::{PrayerEngine, TickOutcome};
use crate::feed::{FeedJob, FeedTicker};
use crate::remote::{ContentSource, FeedItem};
use crate::rotation::{PlaylistItem, RotationScheduler};
use crate::schedule::{
    CoordinateLookup, DailySchedule, ScheduleCalculator, ScheduleJob, local_offset_on,
};
use crate::signals::SignalFlags;
use crate::sync::{CycleReport, SyncJob, SyncOutcome, SyncPoller};
use crate::time_source::TimeSource;

type PlaylistJob = Pin<Box<dyn Future<Output = Result<Vec<PlaylistItem>>>>>;

/// Everything the terminal takes from the bootstrap file.
pub struct TerminalOptions {
    pub site: SiteIdentity,
    pub initial: Configuration,
    pub durations: SlideDurations,
    pub status: StatusWriter,
    pub cue: Box<dyn AudibleCue>,
}

impl TerminalOptions {
    pub fn from_bootstrap(bootstrap: &BootstrapConfig) -> Self {
        Self {
            site: bootstrap.site.clone(),
            initial: bootstrap.initial_configuration(),
            durations: bootstrap.slide_durations(),
            status: StatusWriter::new(bootstrap.status_path()),
            cue: cue::from_command(bootstrap.cue_command.as_deref()),
        }
    }
}

pub struct Terminal {
    clock: Rc<dyn TimeSource>,
    source: Rc<dyn ContentSource>,
    site: SiteIdentity,
    store: ConfigStore,
    calculator: ScheduleCalculator,
    engine: PrayerEngine,
    rotation: RotationScheduler,
    poller: SyncPoller,
    feed: FeedTicker,
    cue: Box<dyn AudibleCue>,
    status: StatusWriter,
    signals: SignalFlags,
    cancel: CancellationToken,

    schedule_job: Option<ScheduleJob>,
    sync_job: Option<SyncJob>,
    playlist_job: Option<PlaylistJob>,
    feed_job: Option<FeedJob>,
}

impl Terminal {
    pub fn new(
        clock: Rc<dyn TimeSource>,
        source: Rc<dyn ContentSource>,
        lookup: Rc<dyn CoordinateLookup>,
        options: TerminalOptions,
        signals: SignalFlags,
    ) -> Self {
        Self {
            clock,
            source,
            feed: FeedTicker::new(&options.site.running_text),
            site: options.site,
            store: ConfigStore::new(options.initial),
            calculator: ScheduleCalculator::new(lookup),
            engine: PrayerEngine::new(),
            rotation: RotationScheduler::new(options.durations),
            poller: SyncPoller::new(),
            cue: options.cue,
            status: options.status,
            signals,
            cancel: CancellationToken::new(),
            schedule_job: None,
            sync_job: None,
            playlist_job: None,
            feed_job: None,
        }
    }

    /// Token that stops [`Terminal::run`] when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn engine(&self) -> &PrayerEngine {
        &self.engine
    }

    pub fn rotation(&self) -> &RotationScheduler {
        &self.rotation
    }

    pub fn schedule(&self) -> Option<&DailySchedule> {
        self.calculator.schedule()
    }

    pub fn config(&self) -> &ConfigStore {
        &self.store
    }

    pub fn feed_items(&self) -> &[FeedItem] {
        self.feed.items()
    }

    /// Run until a shutdown signal arrives or the cancel token fires.
    pub async fn run(mut self) {
        log_block_start!("Starting display loop");

        self.refresh_content();

        let mut ticker = interval(ENGINE_TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let start = tokio::time::Instant::now();
        let mut poll = interval_at(start + SYNC_INITIAL_DELAY, SYNC_INTERVAL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut feed_refresh = interval_at(start + FEED_REFRESH_INTERVAL, FEED_REFRESH_INTERVAL);
        feed_refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let cancel = self.cancel.clone();

        loop {
            let rotation_deadline = self.rotation.deadline();

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.tick(),
                _ = sleep_until_deadline(rotation_deadline) => self.on_rotation_deadline(),
                _ = poll.tick() => self.start_sync(),
                _ = feed_refresh.tick() => self.start_feed_refresh(),
                result = run_job(&mut self.schedule_job) => {
                    self.schedule_job = None;
                    self.apply_schedule(result);
                }
                report = run_job(&mut self.sync_job) => {
                    self.sync_job = None;
                    self.apply_sync(report);
                }
                result = run_job(&mut self.playlist_job) => {
                    self.playlist_job = None;
                    self.apply_playlist(result);
                }
                result = run_job(&mut self.feed_job) => {
                    self.feed_job = None;
                    self.feed.finish(result);
                }
            }
        }

        self.shutdown();
    }

    /// One engine evaluation plus signal handling and status publishing.
    pub fn tick(&mut self) {
        if self.signals.shutdown_requested() {
            self.cancel.cancel();
            return;
        }
        if self.signals.take_playback_complete() && self.rotation.on_playback_complete(Instant::now()) {
            display::log_slide(&self.rotation);
        }
        if self.signals.take_sync_now() {
            log_debug!("Sync requested by signal");
            self.start_sync();
        }

        let now = self.clock.now();
        let outcome = self
            .engine
            .tick(now.naive_local(), self.calculator.schedule(), self.store.current());

        match outcome {
            TickOutcome::Loading => self.ensure_schedule(now.date_naive()),
            TickOutcome::RecomputeNeeded { today } => {
                log_debug!("Schedule is stale, recomputing for {today}");
                self.ensure_schedule(today);
            }
            TickOutcome::Evaluated { transitions } => {
                for transition in &transitions {
                    display::log_transition(transition, &self.engine);
                    if transition.enters_adzan()
                        && let Some(event) = transition.event
                    {
                        cue::play_best_effort(self.cue.as_ref(), event);
                    }
                }
                if self.rotation.on_engine_state(self.engine.state(), Instant::now()) {
                    if self.rotation.is_paused() {
                        log_decorated!("Slides paused");
                    } else {
                        log_decorated!("Slides resumed");
                    }
                }
                // A settings merge may have invalidated today's schedule.
                self.ensure_schedule(now.date_naive());
            }
        }

        self.publish(now);
    }

    /// Snapshot of the current screen.
    pub fn display_state(&self) -> DisplayState {
        self.capture(self.clock.now())
    }

    /// Start fetching the playlist and the feed.
    pub fn refresh_content(&mut self) {
        self.playlist_job = Some(self.begin_playlist_fetch());
        self.start_feed_refresh();
    }

    /// Start a sync cycle unless one is already running.
    pub fn start_sync(&mut self) {
        if self.sync_job.is_none() {
            self.sync_job = Some(self.poller.begin(Rc::clone(&self.source)));
        }
    }

    /// Await every in-flight job and apply its result.
    ///
    /// Jobs started while applying a result are awaited too.
    pub async fn settle(&mut self) {
        loop {
            if let Some(job) = self.schedule_job.take() {
                let result = job.await;
                self.apply_schedule(result);
            } else if let Some(job) = self.sync_job.take() {
                let report = job.await;
                self.apply_sync(report);
            } else if let Some(job) = self.playlist_job.take() {
                let result = job.await;
                self.apply_playlist(result);
            } else if let Some(job) = self.feed_job.take() {
                let result = job.await;
                self.feed.finish(result);
            } else {
                break;
            }
        }
    }

    fn start_feed_refresh(&mut self) {
        self.feed_job = Some(self.feed.begin(Rc::clone(&self.source)));
    }

    fn begin_playlist_fetch(&self) -> PlaylistJob {
        let source = Rc::clone(&self.source);
        Box::pin(async move { source.fetch_playlist().await })
    }

    fn ensure_schedule(&mut self, today: NaiveDate) {
        if self.schedule_job.is_some() {
            return;
        }
        self.schedule_job = self.calculator.recompute(
            self.store.current(),
            self.store.version(),
            today,
            local_offset_on(today),
        );
        if self.schedule_job.is_some() {
            log_debug!("Computing prayer times for {today}");
        }
    }

    fn apply_schedule(&mut self, result: Result<DailySchedule>) {
        match result {
            Ok(schedule) => {
                display::log_schedule(&schedule);
                self.calculator.install(schedule);
            }
            Err(e) => log_error!("Prayer time computation failed: {e:#}"),
        }
    }

    fn apply_sync(&mut self, report: CycleReport) {
        let outcome = self.poller.finish(report, &mut self.store, self.clock.now());
        if let SyncOutcome::ContentChanged { config_changed } = outcome {
            if config_changed {
                log_indented!("Prayer times will be recomputed");
            }
            self.refresh_content();
        }
    }

    fn apply_playlist(&mut self, result: Result<Vec<PlaylistItem>>) {
        match result {
            Ok(items) => {
                let before = self.rotation.current().cloned();
                self.rotation
                    .replace_playlist(items, self.store.current(), Instant::now());
                log_decorated!("Playlist loaded ({} items)", self.rotation.items().len());
                if self.rotation.current() != before.as_ref() {
                    display::log_slide(&self.rotation);
                }
            }
            Err(e) => log_warning!("Playlist refresh failed: {e:#}"),
        }
    }

    fn on_rotation_deadline(&mut self) {
        if self.rotation.fire_due(Instant::now()) {
            display::log_slide(&self.rotation);
        }
    }

    fn capture(&self, now: DateTime<Local>) -> DisplayState {
        DisplayState::capture(DisplaySources {
            now: now.naive_local(),
            simulated: self.clock.is_simulated(),
            site: &self.site,
            engine: &self.engine,
            schedule: self.calculator.schedule(),
            rotation: &self.rotation,
            feed: self.feed.items(),
            config_version: self.store.version(),
        })
    }

    fn publish(&mut self, now: DateTime<Local>) {
        let state = self.capture(now);
        self.status.publish(&state);
    }

    fn shutdown(&mut self) {
        self.schedule_job = None;
        self.sync_job = None;
        self.playlist_job = None;
        self.feed_job = None;

        log_block_start!("Shutting down");
        log_end!();
    }
}

/// Await an optional job, staying pending while there is none.
async fn run_job<T>(job: &mut Option<Pin<Box<dyn Future<Output = T>>>>) -> T {
    match job.as_mut() {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
