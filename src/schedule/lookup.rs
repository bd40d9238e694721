//! Coordinate resolution for deployments configured with a city identifier.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::config::Configuration;
use crate::constants::{FALLBACK_LATITUDE, FALLBACK_LONGITUDE, FETCH_TIMEOUT};

static LATITUDE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Latitude:\s*([-\d.]+)").expect("valid latitude pattern"));
static LONGITUDE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Longitude:\s*([-\d.]+)").expect("valid longitude pattern"));

/// Resolves a city identifier to `(latitude, longitude)`.
#[async_trait(?Send)]
pub trait CoordinateLookup {
    async fn lookup(&self, city_id: &str) -> Result<(f64, f64)>;
}

/// Looks coordinates up from a WordPress post whose body lists them.
pub struct HttpCoordinateLookup {
    client: reqwest::Client,
    url_template: String,
}

#[derive(Deserialize)]
struct PostBody {
    content: RenderedContent,
}

#[derive(Deserialize)]
struct RenderedContent {
    #[serde(default)]
    rendered: String,
}

impl HttpCoordinateLookup {
    /// `url_template` must contain `{id}`.
    pub fn new(url_template: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("Failed to build lookup HTTP client")?;

        Ok(Self {
            client,
            url_template: url_template.into(),
        })
    }
}

#[async_trait(?Send)]
impl CoordinateLookup for HttpCoordinateLookup {
    async fn lookup(&self, city_id: &str) -> Result<(f64, f64)> {
        if city_id.is_empty() || !city_id.chars().all(|c| c.is_ascii_digit()) {
            anyhow::bail!("city_id '{city_id}' is not numeric");
        }

        let url = self.url_template.replace("{id}", city_id);
        let body: PostBody = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Lookup request to {url} failed"))?
            .error_for_status()?
            .json()
            .await
            .context("Lookup response is not a post")?;

        parse_coordinates(&body.content.rendered)
            .with_context(|| format!("No coordinates in lookup response for city {city_id}"))
    }
}

/// Extract `Latitude: <n>` and `Longitude: <n>` from rendered post content.
pub fn parse_coordinates(rendered: &str) -> Option<(f64, f64)> {
    let capture = |pattern: &Regex| -> Option<f64> {
        let raw = pattern.captures(rendered)?.get(1)?.as_str();
        raw.trim_end_matches('.').parse().ok()
    };

    Some((capture(&LATITUDE_PATTERN)?, capture(&LONGITUDE_PATTERN)?))
}

/// Where the coordinates used for a schedule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateOrigin {
    Configured,
    Lookup,
    Fallback,
}

/// Pick coordinates: configured values, then the lookup, then the fixed fallback.
///
/// Never fails; lookup errors are logged and answered with the fallback pair.
pub async fn resolve_coordinates(
    lookup: &dyn CoordinateLookup,
    config: &Configuration,
) -> ((f64, f64), CoordinateOrigin) {
    if let Some(coords) = config.coordinates() {
        return (coords, CoordinateOrigin::Configured);
    }

    let fallback = ((FALLBACK_LATITUDE, FALLBACK_LONGITUDE), CoordinateOrigin::Fallback);

    let Some(city_id) = config.city_id.as_deref() else {
        log_warning!("No coordinates or city_id configured, using fallback location");
        return fallback;
    };

    match lookup.lookup(city_id).await {
        Ok(coords) => (coords, CoordinateOrigin::Lookup),
        Err(e) => {
            log_warning!("Coordinate lookup failed: {e:#}");
            log_indented!("Using fallback location {FALLBACK_LATITUDE}, {FALLBACK_LONGITUDE}");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLookup(Result<(f64, f64), String>);

    #[async_trait(?Send)]
    impl CoordinateLookup for FixedLookup {
        async fn lookup(&self, _city_id: &str) -> Result<(f64, f64)> {
            self.0.clone().map_err(anyhow::Error::msg)
        }
    }

    #[test]
    fn test_parse_coordinates_from_rendered_html() {
        let html = "<p>Kota Bogor<br>Latitude: -6.5950<br>Longitude: 106.7970.</p>";
        assert_eq!(parse_coordinates(html), Some((-6.595, 106.797)));
        assert_eq!(parse_coordinates("<p>Latitude: -6.5</p>"), None);
    }

    #[tokio::test]
    async fn test_resolve_prefers_configured_coordinates() {
        let config = Configuration {
            latitude: Some(-7.25),
            longitude: Some(112.75),
            city_id: Some("1301".into()),
            ..Default::default()
        };
        let lookup = FixedLookup(Ok((1.0, 2.0)));

        let (coords, origin) = resolve_coordinates(&lookup, &config).await;
        assert_eq!(coords, (-7.25, 112.75));
        assert_eq!(origin, CoordinateOrigin::Configured);
    }

    #[tokio::test]
    async fn test_resolve_uses_lookup_then_fallback() {
        crate::logger::Log::set_enabled(false);
        let config = Configuration {
            city_id: Some("1301".into()),
            ..Default::default()
        };

        let ok = FixedLookup(Ok((-6.2, 106.8)));
        assert_eq!(
            resolve_coordinates(&ok, &config).await,
            ((-6.2, 106.8), CoordinateOrigin::Lookup)
        );

        let failing = FixedLookup(Err("timeout".into()));
        assert_eq!(
            resolve_coordinates(&failing, &config).await,
            ((FALLBACK_LATITUDE, FALLBACK_LONGITUDE), CoordinateOrigin::Fallback)
        );

        let missing = Configuration::default();
        assert_eq!(
            resolve_coordinates(&ok, &missing).await.1,
            CoordinateOrigin::Fallback
        );
    }
}
