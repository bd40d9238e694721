//! Running-text ticker.

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use crate::constants::FEED_FALLBACK_ICON;
use crate::remote::{ContentSource, FeedItem};

pub type FeedJob = Pin<Box<dyn Future<Output = Result<Vec<FeedItem>>>>>;

/// Holds the ticker items, falling back to the site's static message.
#[derive(Debug, Clone, Default)]
pub struct FeedTicker {
    items: Vec<FeedItem>,
    fallback: Option<FeedItem>,
}

impl FeedTicker {
    pub fn new(static_text: &str) -> Self {
        let fallback = (!static_text.trim().is_empty()).then(|| FeedItem {
            kind: "static".to_string(),
            text: static_text.trim().to_string(),
            icon: FEED_FALLBACK_ICON.to_string(),
        });

        Self {
            items: fallback.iter().cloned().collect(),
            fallback,
        }
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn begin(&self, source: Rc<dyn ContentSource>) -> FeedJob {
        Box::pin(async move { source.fetch_feed().await })
    }

    /// Apply a fetch result. A failure shows the static message when there is one
    /// and otherwise keeps the previous items.
    pub fn finish(&mut self, result: Result<Vec<FeedItem>>) {
        match result {
            Ok(items) => {
                log_debug!("Running text refreshed ({} items)", items.len());
                self.items = items;
            }
            Err(e) => {
                log_warning!("Running text refresh failed: {e:#}");
                if let Some(fallback) = &self.fallback {
                    self.items = vec![fallback.clone()];
                }
            }
        }
    }
}
