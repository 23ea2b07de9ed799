//! Single-image cache with a three-tier refresh policy
//!
//! Keeps one fetched image in memory and on disk. Each read classifies the
//! cached entry by age against a freshness threshold `T`:
//!
//! - `age <= T`: served as-is
//! - `T < age <= 2T`: served once more while a refresh is triggered
//! - `age > 2T` or nothing cached: fetched synchronously
//!
//! Fetch failures never escape the cache; callers get the last good image
//! or nothing.

mod cache;
mod error;
mod source;
mod store;
mod types;

pub use cache::ImageCache;
pub use error::{ImageCacheError, Result};
pub use source::{FetchedImage, HttpImageSource, ImageSource, MAX_REDIRECTS};
pub use store::DiskStore;
pub use types::{
    content_type_for_extension, extension_for, CacheEntry, CachePolicy, CacheStats, Freshness,
    Metadata, RefreshMode, DEFAULT_CONTENT_TYPE, DEFAULT_FRESH_FOR,
};
