//! Change detection against the content service.
//!
//! A cycle fetches the content fingerprint. The first successful fetch only records
//! a baseline. Later cycles compare against the stored hash and, on a change, fetch
//! the settings exactly once and merge them into the live configuration. Failures
//! are logged and count as "no update" for that cycle; the next interval retries.
//!
//! A cycle is split in two so the network half can run as an owned future inside
//! the event loop while the configuration stays on the loop itself:
//! [`SyncPoller::begin`] produces the future and [`SyncPoller::finish`] applies its
//! report.

use anyhow::Result;
use chrono::{DateTime, Local};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use crate::config::ConfigStore;
use crate::remote::{ContentHash, ContentSource};

/// Last observed fingerprint and when it was captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFingerprint {
    pub hash: String,
    pub captured_at: DateTime<Local>,
}

/// Raw results of the network half of a cycle.
#[derive(Debug)]
pub struct CycleReport {
    fingerprint: Result<ContentHash>,
    /// Present only when the hash changed against a known baseline.
    settings: Option<Result<Map<String, Value>>>,
}

/// What a cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Fetch failed or the fingerprint is unchanged.
    NoUpdate,
    /// First fingerprint recorded; nothing refetched.
    Baseline,
    /// The fingerprint changed. `config_changed` is `true` when the merged
    /// settings differ from the previous record.
    ContentChanged { config_changed: bool },
}

impl SyncOutcome {
    /// Whether playlist and feed should be refetched.
    pub fn content_changed(&self) -> bool {
        matches!(self, SyncOutcome::ContentChanged { .. })
    }
}

pub type SyncJob = Pin<Box<dyn Future<Output = CycleReport>>>;

#[derive(Debug, Default)]
pub struct SyncPoller {
    fingerprint: Option<SyncFingerprint>,
}

impl SyncPoller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fingerprint(&self) -> Option<&SyncFingerprint> {
        self.fingerprint.as_ref()
    }

    /// Start the network half of a cycle.
    pub fn begin(&self, source: Rc<dyn ContentSource>) -> SyncJob {
        let known = self.fingerprint.as_ref().map(|f| f.hash.clone());
        Box::pin(async move { run_cycle(source.as_ref(), known).await })
    }

    /// Apply a finished cycle to the poller and the configuration.
    pub fn finish(&mut self, report: CycleReport, store: &mut ConfigStore, now: DateTime<Local>) -> SyncOutcome {
        let remote = match report.fingerprint {
            Ok(remote) => remote,
            Err(e) => {
                log_warning!("Content check failed: {e:#}");
                return SyncOutcome::NoUpdate;
            }
        };

        let previous = self.fingerprint.replace(SyncFingerprint {
            hash: remote.hash.clone(),
            captured_at: now,
        });

        let Some(previous) = previous else {
            log_debug!("Content baseline recorded: {}", remote.hash);
            return SyncOutcome::Baseline;
        };

        if previous.hash == remote.hash {
            // Keep the original capture time for an unchanged hash.
            self.fingerprint = Some(previous);
            return SyncOutcome::NoUpdate;
        }

        log_block_start!("Content changed on the server");
        log_indented!("Fingerprint {} -> {}", previous.hash, remote.hash);

        let config_changed = match report.settings {
            Some(Ok(settings)) => {
                let changed = store.merge(&settings);
                if changed {
                    log_decorated!("Settings updated (version {})", store.version());
                } else {
                    log_decorated!("Settings unchanged");
                }
                changed
            }
            Some(Err(e)) => {
                log_warning!("Settings refresh failed: {e:#}");
                false
            }
            None => false,
        };

        SyncOutcome::ContentChanged { config_changed }
    }

    /// Run a complete cycle in place.
    pub async fn check_for_updates(
        &mut self,
        source: &dyn ContentSource,
        store: &mut ConfigStore,
        now: DateTime<Local>,
    ) -> SyncOutcome {
        let known = self.fingerprint.as_ref().map(|f| f.hash.clone());
        let report = run_cycle(source, known).await;
        self.finish(report, store, now)
    }
}

async fn run_cycle(source: &dyn ContentSource, known: Option<String>) -> CycleReport {
    let fingerprint = source.fetch_fingerprint().await;

    let changed = match (&fingerprint, &known) {
        (Ok(remote), Some(known)) => remote.hash != *known,
        _ => false,
    };

    let settings = if changed {
        Some(source.fetch_settings().await)
    } else {
        None
    };

    CycleReport {
        fingerprint,
        settings,
    }
}
