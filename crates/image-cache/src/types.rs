//! Cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Content type assumed when upstream doesn't send one
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Default freshness threshold `T` (10 minutes)
pub const DEFAULT_FRESH_FOR: Duration = Duration::from_secs(10 * 60);

/// The cached image and when it was fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub blob: Vec<u8>,
    pub content_type: String,
    /// Final URL after redirect resolution
    pub source_url: String,
    /// Millisecond precision, matching what is persisted
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(
        blob: Vec<u8>,
        content_type: impl Into<String>,
        source_url: impl Into<String>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            blob,
            content_type: content_type.into(),
            source_url: source_url.into(),
            fetched_at: truncate_to_millis(fetched_at),
        }
    }

    /// Age of the entry relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.fetched_at
    }

    pub fn metadata(&self) -> Metadata {
        Metadata {
            timestamp: self.fetched_at.timestamp_millis(),
            url: self.source_url.clone(),
            content_type: Some(self.content_type.clone()),
        }
    }
}

/// Contents of `metadata.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Fetch time in epoch milliseconds
    pub timestamp: i64,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Where an entry sits relative to the freshness threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// `age <= T`
    Fresh,
    /// `T < age <= 2T`
    StaleOnce,
    /// `age > 2T`
    Expired,
}

impl Freshness {
    /// Classify an entry age against threshold `fresh_for`.
    ///
    /// Negative ages (clock went backwards) count as fresh.
    pub fn classify(age: chrono::Duration, fresh_for: Duration) -> Self {
        let age_ms = age.num_milliseconds();
        let fresh_ms = i64::try_from(fresh_for.as_millis()).unwrap_or(i64::MAX);

        if age_ms <= fresh_ms {
            Freshness::Fresh
        } else if age_ms <= fresh_ms.saturating_mul(2) {
            Freshness::StaleOnce
        } else {
            Freshness::Expired
        }
    }
}

/// How the stale-once tier refreshes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshMode {
    /// Fetch before responding; the response carries the refreshed image
    #[default]
    Inline,
    /// Respond with the stale image and refresh on a detached task
    Background,
}

impl FromStr for RefreshMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(RefreshMode::Inline),
            "background" => Ok(RefreshMode::Background),
            other => Err(format!("unknown refresh mode: {}", other)),
        }
    }
}

impl fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshMode::Inline => write!(f, "inline"),
            RefreshMode::Background => write!(f, "background"),
        }
    }
}

/// Refresh policy knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Freshness threshold `T`; `2T` is the hard expiry
    pub fresh_for: Duration,
    pub refresh_mode: RefreshMode,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            fresh_for: DEFAULT_FRESH_FOR,
            refresh_mode: RefreshMode::Inline,
        }
    }
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub has_entry: bool,
    /// Age of the current entry in seconds, if any
    pub age_secs: Option<i64>,
    pub hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub fetch_failures: u64,
}

/// File extension used for the persisted image
pub fn extension_for(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        _ => "bin",
    }
}

/// Content type for a persisted image extension, inverse of [`extension_for`]
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

pub(crate) fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}
