use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;
use mrty_tv::config::{ConfigStore, Configuration};
use mrty_tv::logger::Log;
use mrty_tv::remote::{ContentHash, ContentSource, FeedItem};
use mrty_tv::rotation::PlaylistItem;
use mrty_tv::sync::{SyncOutcome, SyncPoller};
use serde_json::{Map, Value, json};
use std::cell::{Cell, RefCell};

/// Content service double with a settable hash and settings payload.
struct FakeService {
    hash: RefCell<String>,
    settings: RefCell<Option<Value>>,
    fingerprint_calls: Cell<u32>,
    settings_calls: Cell<u32>,
}

impl FakeService {
    fn new(hash: &str, settings: Value) -> Self {
        Self {
            hash: RefCell::new(hash.to_string()),
            settings: RefCell::new(Some(settings)),
            fingerprint_calls: Cell::new(0),
            settings_calls: Cell::new(0),
        }
    }

    fn set_hash(&self, hash: &str) {
        *self.hash.borrow_mut() = hash.to_string();
    }
}

#[async_trait(?Send)]
impl ContentSource for FakeService {
    async fn fetch_fingerprint(&self) -> Result<ContentHash> {
        self.fingerprint_calls.set(self.fingerprint_calls.get() + 1);
        Ok(ContentHash {
            hash: self.hash.borrow().clone(),
            time: "2024-01-05 10:00:00".to_string(),
        })
    }

    async fn fetch_settings(&self) -> Result<Map<String, Value>> {
        self.settings_calls.set(self.settings_calls.get() + 1);
        match self.settings.borrow().clone() {
            Some(Value::Object(map)) => Ok(map),
            _ => anyhow::bail!("settings endpoint unavailable"),
        }
    }

    async fn fetch_playlist(&self) -> Result<Vec<PlaylistItem>> {
        Ok(Vec::new())
    }

    async fn fetch_feed(&self) -> Result<Vec<FeedItem>> {
        Ok(Vec::new())
    }
}

fn store() -> ConfigStore {
    ConfigStore::new(Configuration {
        approaching_mins: 15,
        latitude: Some(-6.6),
        longitude: Some(106.8),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_unchanged_fingerprint_never_refetches() {
    Log::set_enabled(false);
    let service = FakeService::new("abc", json!({ "iqamah_duration": 7 }));
    let mut poller = SyncPoller::new();
    let mut store = store();

    for _ in 0..5 {
        poller.check_for_updates(&service, &mut store, Local::now()).await;
    }

    assert_eq!(service.fingerprint_calls.get(), 5);
    assert_eq!(service.settings_calls.get(), 0);
    assert_eq!(store.version(), 0);
}

#[tokio::test]
async fn test_change_merges_without_dropping_fields() {
    Log::set_enabled(false);
    let service = FakeService::new("abc", json!({ "iqamah_duration": 7, "adj_maghrib": 2 }));
    let mut poller = SyncPoller::new();
    let mut store = store();

    let first = poller.check_for_updates(&service, &mut store, Local::now()).await;
    assert_eq!(first, SyncOutcome::Baseline);

    service.set_hash("def");
    let outcome = poller.check_for_updates(&service, &mut store, Local::now()).await;
    assert_eq!(outcome, SyncOutcome::ContentChanged { config_changed: true });
    assert!(outcome.content_changed());
    assert_eq!(service.settings_calls.get(), 1);

    let config = store.current();
    assert_eq!(config.iqamah_duration, 7);
    assert_eq!(config.adjustments[4], 2);
    assert_eq!(config.approaching_mins, 15);
    assert_eq!(config.coordinates(), Some((-6.6, 106.8)));
    assert_eq!(store.version(), 1);
}

#[tokio::test]
async fn test_identical_settings_keep_version() {
    Log::set_enabled(false);
    let service = FakeService::new("abc", json!({ "approaching_mins": 15 }));
    let mut poller = SyncPoller::new();
    let mut store = store();

    poller.check_for_updates(&service, &mut store, Local::now()).await;
    service.set_hash("def");
    let outcome = poller.check_for_updates(&service, &mut store, Local::now()).await;

    assert_eq!(outcome, SyncOutcome::ContentChanged { config_changed: false });
    assert_eq!(store.version(), 0);
}

#[tokio::test]
async fn test_failed_settings_fetch_records_new_fingerprint() {
    Log::set_enabled(false);
    let service = FakeService::new("abc", json!(null));
    let mut poller = SyncPoller::new();
    let mut store = store();

    poller.check_for_updates(&service, &mut store, Local::now()).await;
    service.set_hash("def");
    let outcome = poller.check_for_updates(&service, &mut store, Local::now()).await;

    assert_eq!(outcome, SyncOutcome::ContentChanged { config_changed: false });
    assert_eq!(poller.fingerprint().map(|f| f.hash.as_str()), Some("def"));

    // The same hash is not treated as a change again.
    let again = poller.check_for_updates(&service, &mut store, Local::now()).await;
    assert_eq!(again, SyncOutcome::NoUpdate);
    assert_eq!(service.settings_calls.get(), 1);
}
