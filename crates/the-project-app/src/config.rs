use image_cache::{CachePolicy, RefreshMode, DEFAULT_FRESH_FOR};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_IMAGE_URL: &str = "https://picsum.photos/1200";
const DEFAULT_CACHE_DIR: &str = "./files";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Application configuration parsed from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub image_url: String,
    pub cache_dir: PathBuf,
    pub fresh_for: Duration,
    pub fetch_timeout: Duration,
    pub refresh_mode: RefreshMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            image_url: DEFAULT_IMAGE_URL.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            fresh_for: DEFAULT_FRESH_FOR,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            refresh_mode: RefreshMode::Inline,
        }
    }
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Parse configuration from an arbitrary variable lookup.
    ///
    /// Unparseable values are logged and replaced by their defaults.
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = parse_or(&get, "PORT", defaults.port);

        let image_url = get("IMAGE_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.image_url);

        let cache_dir = get("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);

        let fresh_for = Duration::from_secs(parse_or(
            &get,
            "IMAGE_FRESH_SECS",
            defaults.fresh_for.as_secs(),
        ));

        let fetch_timeout = Duration::from_secs(parse_or(
            &get,
            "FETCH_TIMEOUT_SECS",
            defaults.fetch_timeout.as_secs(),
        ));

        let refresh_mode = parse_or(&get, "REFRESH_MODE", defaults.refresh_mode);

        Self {
            port,
            image_url,
            cache_dir,
            fresh_for,
            fetch_timeout,
            refresh_mode,
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            fresh_for: self.fresh_for,
            refresh_mode: self.refresh_mode,
        }
    }
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match get(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "Invalid value, using default");
                default
            }
        },
        None => default,
    }
}
