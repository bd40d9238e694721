//! Field-level sanitizing for synced settings and bootstrap validation.
//!
//! Remote settings come from an admin form and may carry numbers, numeric strings,
//! empty strings or garbage. Each field is coerced on its own so one bad value never
//! discards the rest of the record.

use anyhow::Result;
use serde_json::Value;

use super::BootstrapConfig;
use crate::constants::*;

/// Read an integer from a JSON number or a numeric string.
///
/// Fractional values are truncated toward zero.
pub fn read_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Read a finite float from a JSON number or a numeric string.
pub fn read_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

/// Stage durations and the approaching window: absolute value, 1-60 minutes.
///
/// Zero, missing and unparseable values fall back to `default`; anything above the
/// ceiling is capped.
pub fn sanitize_duration(raw: Option<i64>, default: u32) -> u32 {
    match raw.map(i64::unsigned_abs) {
        Some(0) | None => default,
        Some(minutes) => minutes.clamp(
            u64::from(MINIMUM_STAGE_MINUTES),
            u64::from(MAXIMUM_STAGE_MINUTES),
        ) as u32,
    }
}

/// Optional per-event overrides: 0 means "use the global duration".
pub fn sanitize_override(raw: Option<i64>) -> u32 {
    match raw.map(i64::unsigned_abs) {
        Some(minutes) => minutes.min(u64::from(MAXIMUM_STAGE_MINUTES)) as u32,
        None => 0,
    }
}

/// Signed minute adjustment, clamped to ±30.
pub fn sanitize_adjustment(raw: Option<i64>) -> i32 {
    let limit = i64::from(MAXIMUM_ADJUSTMENT_MINUTES);
    raw.unwrap_or(0).clamp(-limit, limit) as i32
}

/// Playlist item-count limit: absolute value, missing means `default`.
pub fn sanitize_limit(raw: Option<i64>, default: u32) -> u32 {
    raw.map(|n| n.unsigned_abs().min(u64::from(u32::MAX)) as u32)
        .unwrap_or(default)
}

pub fn sanitize_latitude(raw: Option<f64>) -> Option<f64> {
    raw.filter(|lat| (-90.0..=90.0).contains(lat))
}

pub fn sanitize_longitude(raw: Option<f64>) -> Option<f64> {
    raw.filter(|lon| (-180.0..=180.0).contains(lon))
}

/// Read a lookup identifier that may arrive as a string or a number.
pub fn read_identifier(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

/// Reject bootstrap files that cannot drive a terminal at all.
pub fn validate_bootstrap(config: &BootstrapConfig) -> Result<()> {
    if let Some(url) = &config.rest_url
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        anyhow::bail!("rest_url must be an absolute http(s) URL (got '{}')", url);
    }

    if let Some(url) = &config.lookup_url
        && !url.contains("{id}")
    {
        anyhow::bail!("lookup_url must contain the '{{id}}' placeholder (got '{}')", url);
    }

    if let Some(secs) = config.image_duration
        && secs == 0
    {
        anyhow::bail!("image_duration must be at least 1 second");
    }

    if let Some(secs) = config.video_fallback
        && secs == 0
    {
        anyhow::bail!("video_fallback must be at least 1 second");
    }

    if let Some(secs) = config.campaign_duration
        && !(MINIMUM_CAMPAIGN_SECS..=MAXIMUM_CAMPAIGN_SECS).contains(&secs)
    {
        anyhow::bail!(
            "campaign_duration ({} s) must be between {} and {} seconds",
            secs,
            MINIMUM_CAMPAIGN_SECS,
            MAXIMUM_CAMPAIGN_SECS
        );
    }

    Ok(())
}
