//! Content service client.
//!
//! The terminal consumes four JSON endpoints below one REST base URL:
//!
//! - `GET {base}/content-hash`: `{ "hash": "...", "time": "..." }`
//! - `GET {base}/settings`: flat settings object
//! - `GET {base}/slides`: playlist items tagged by `"type"`
//! - `GET {base}/running-text`: `[{ "type", "text", "icon" }]`
//!
//! Every request carries a 5 second timeout and bypasses HTTP caches.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderValue, PRAGMA};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::FETCH_TIMEOUT;
use crate::rotation::PlaylistItem;

/// Fingerprint reported by the content service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContentHash {
    pub hash: String,
    /// Server-side timestamp, informational only.
    #[serde(default)]
    pub time: String,
}

/// One running-text entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedItem {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub text: String,
    #[serde(default)]
    pub icon: String,
}

/// Read access to the content service.
#[async_trait(?Send)]
pub trait ContentSource {
    async fn fetch_fingerprint(&self) -> Result<ContentHash>;
    async fn fetch_settings(&self) -> Result<Map<String, Value>>;
    async fn fetch_playlist(&self) -> Result<Vec<PlaylistItem>>;
    async fn fetch_feed(&self) -> Result<Vec<FeedItem>>;
}

/// HTTP implementation backed by `reqwest`.
pub struct HttpContentClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpContentClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .default_headers(headers)
            .build()
            .context("Failed to build content service HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}/{endpoint}", self.base_url);
        self.client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("{url} returned an error status"))?
            .json::<T>()
            .await
            .with_context(|| format!("Malformed response from {url}"))
    }
}

#[async_trait(?Send)]
impl ContentSource for HttpContentClient {
    async fn fetch_fingerprint(&self) -> Result<ContentHash> {
        self.get_json("content-hash").await
    }

    async fn fetch_settings(&self) -> Result<Map<String, Value>> {
        self.get_json("settings").await
    }

    async fn fetch_playlist(&self) -> Result<Vec<PlaylistItem>> {
        let raw: Vec<Value> = self.get_json("slides").await?;
        Ok(parse_playlist(raw))
    }

    async fn fetch_feed(&self) -> Result<Vec<FeedItem>> {
        self.get_json("running-text").await
    }
}

/// Decode playlist entries one by one, skipping the ones that do not parse.
pub fn parse_playlist(raw: Vec<Value>) -> Vec<PlaylistItem> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(position, value)| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                log_warning!("Skipping playlist entry {position}: {e}");
                None
            }
        })
        .collect()
}
