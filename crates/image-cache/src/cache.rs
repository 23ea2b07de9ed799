//! The image cache and its refresh policy

use crate::error::Result;
use crate::source::ImageSource;
use crate::store::DiskStore;
use crate::types::{CacheEntry, CachePolicy, CacheStats, Freshness, RefreshMode};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Cache for a single upstream image.
///
/// Cheap to clone; clones share state. Build one at startup and hand it to
/// request handlers.
#[derive(Clone)]
pub struct ImageCache {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn ImageSource>,
    store: DiskStore,
    policy: CachePolicy,
    /// Current entry; swapped whole, never mutated in place
    entry: RwLock<Option<Arc<CacheEntry>>>,
    /// Held for the duration of every fetch
    fetch_lock: Mutex<()>,
    /// Bumped after each fetch attempt, successful or not
    attempts: AtomicU64,
    background_refresh: AtomicBool,
    hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
}

impl ImageCache {
    pub fn new(source: Arc<dyn ImageSource>, store: DiskStore, policy: CachePolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                store,
                policy,
                entry: RwLock::new(None),
                fetch_lock: Mutex::new(()),
                attempts: AtomicU64::new(0),
                background_refresh: AtomicBool::new(false),
                hits: AtomicU64::new(0),
                stale_hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                fetches: AtomicU64::new(0),
                fetch_failures: AtomicU64::new(0),
            }),
        }
    }

    /// Create the storage directory and load any persisted entry.
    ///
    /// Storage problems are logged and leave the cache empty; the cache still
    /// serves from memory when the directory is unusable.
    pub async fn init(&self) {
        if let Err(e) = self.inner.store.init().await {
            warn!(
                dir = ?self.inner.store.dir(),
                error = %e,
                "Image store unavailable, starting empty"
            );
            return;
        }

        match self.inner.store.load().await {
            Ok(Some(entry)) => {
                info!(
                    url = %entry.source_url,
                    fetched_at = %entry.fetched_at,
                    size = entry.blob.len(),
                    "Loaded cached image from disk"
                );
                *self.inner.entry.write().await = Some(Arc::new(entry));
            }
            Ok(None) => debug!("No cached image on disk"),
            Err(e) => warn!(error = %e, "Ignoring unreadable cached image"),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.inner.policy
    }

    /// Current entry without applying the refresh policy
    pub async fn current(&self) -> Option<Arc<CacheEntry>> {
        self.inner.entry.read().await.clone()
    }

    /// Get the image, refreshing according to its age.
    ///
    /// Returns `None` only when nothing is cached and the fetch failed.
    pub async fn get_image(&self) -> Option<Arc<CacheEntry>> {
        let seen = self.inner.attempts.load(Ordering::Acquire);

        let Some(entry) = self.current().await else {
            self.inner.misses.fetch_add(1, Ordering::Relaxed);
            debug!("No cached image, fetching");
            return self.refresh(seen).await;
        };

        let age = entry.age(Utc::now());
        match Freshness::classify(age, self.inner.policy.fresh_for) {
            Freshness::Fresh => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry)
            }
            Freshness::StaleOnce => {
                self.inner.stale_hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    age_secs = age.num_seconds(),
                    mode = %self.inner.policy.refresh_mode,
                    "Cached image stale, refreshing"
                );
                match self.inner.policy.refresh_mode {
                    RefreshMode::Inline => self.refresh(seen).await.or(Some(entry)),
                    RefreshMode::Background => {
                        self.spawn_refresh(seen);
                        Some(entry)
                    }
                }
            }
            Freshness::Expired => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                debug!(age_secs = age.num_seconds(), "Cached image expired, fetching");
                self.refresh(seen).await.or(Some(entry))
            }
        }
    }

    /// Fetch from upstream unconditionally and store the result.
    ///
    /// Waits for any fetch already in flight, then performs its own.
    pub async fn fetch(&self) -> Result<Arc<CacheEntry>> {
        let _guard = self.inner.fetch_lock.lock().await;
        self.fetch_locked().await
    }

    /// Single-flight refresh: if another caller finished a fetch attempt
    /// after `seen` was read, reuse its outcome instead of fetching again.
    async fn refresh(&self, seen: u64) -> Option<Arc<CacheEntry>> {
        let _guard = self.inner.fetch_lock.lock().await;

        if self.inner.attempts.load(Ordering::Acquire) != seen {
            debug!("Fetch completed while waiting, reusing result");
            return self.current().await;
        }

        match self.fetch_locked().await {
            Ok(entry) => Some(entry),
            Err(_) => self.current().await,
        }
    }

    fn spawn_refresh(&self, seen: u64) {
        if self.inner.background_refresh.swap(true, Ordering::AcqRel) {
            debug!("Background refresh already running");
            return;
        }

        let cache = self.clone();
        tokio::spawn(async move {
            cache.refresh(seen).await;
            cache
                .inner
                .background_refresh
                .store(false, Ordering::Release);
        });
    }

    /// Caller must hold `fetch_lock`
    async fn fetch_locked(&self) -> Result<Arc<CacheEntry>> {
        self.inner.fetches.fetch_add(1, Ordering::Relaxed);
        let result = self.inner.source.fetch().await;

        let outcome = match result {
            Ok(image) => {
                let entry = Arc::new(CacheEntry::new(
                    image.bytes,
                    image.content_type,
                    image.url,
                    Utc::now(),
                ));

                if let Err(e) = self.inner.store.save(&entry).await {
                    // Still serve the new image from memory
                    warn!(error = %e, "Failed to persist image");
                }

                *self.inner.entry.write().await = Some(entry.clone());
                info!(
                    url = %entry.source_url,
                    size = entry.blob.len(),
                    "Cached new image"
                );
                Ok(entry)
            }
            Err(e) => {
                self.inner.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Failed to fetch image");
                Err(e)
            }
        };

        self.inner.attempts.fetch_add(1, Ordering::Release);
        outcome
    }

    /// Get current cache statistics
    pub async fn stats(&self) -> CacheStats {
        let entry = self.current().await;
        CacheStats {
            has_entry: entry.is_some(),
            age_secs: entry.map(|e| e.age(Utc::now()).num_seconds()),
            hits: self.inner.hits.load(Ordering::Relaxed),
            stale_hits: self.inner.stale_hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            fetches: self.inner.fetches.load(Ordering::Relaxed),
            fetch_failures: self.inner.fetch_failures.load(Ordering::Relaxed),
        }
    }
}
