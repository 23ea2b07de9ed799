//! On-disk persistence of the cached image
//!
//! Layout inside the cache directory:
//!
//! - `image.<ext>`: raw bytes
//! - `metadata.json`: `{ "timestamp": <epoch-millis>, "url": "..." }`
//!
//! The blob is always written before the metadata, so a metadata file never
//! points at bytes from an older fetch.

use crate::error::{ImageCacheError, Result};
use crate::types::{content_type_for_extension, extension_for, CacheEntry, Metadata};
use chrono::DateTime;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

const METADATA_FILE: &str = "metadata.json";
const IMAGE_STEM: &str = "image";

/// Directory-backed storage for a single cache entry
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    pub fn image_path(&self, content_type: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", IMAGE_STEM, extension_for(content_type)))
    }

    /// Ensure the storage directory exists
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        info!(dir = ?self.dir, "Image store initialized");
        Ok(())
    }

    /// Load the persisted entry.
    ///
    /// `Ok(None)` when nothing has been stored yet. Unreadable metadata or a
    /// metadata file without its image yields `MetadataParse`.
    pub async fn load(&self) -> Result<Option<CacheEntry>> {
        let raw = match fs::read(self.metadata_path()).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ImageCacheError::MetadataParse(format!(
                    "failed to read {}: {}",
                    METADATA_FILE, e
                )))
            }
        };

        let metadata: Metadata = serde_json::from_slice(&raw)?;
        let fetched_at = DateTime::from_timestamp_millis(metadata.timestamp).ok_or_else(|| {
            ImageCacheError::MetadataParse(format!("timestamp out of range: {}", metadata.timestamp))
        })?;

        let image_path = match &metadata.content_type {
            Some(content_type) => self.image_path(content_type),
            None => self.find_image().await?.ok_or_else(|| {
                ImageCacheError::MetadataParse("metadata present but no image file".to_string())
            })?,
        };

        let blob = fs::read(&image_path).await.map_err(|e| {
            ImageCacheError::MetadataParse(format!(
                "metadata present but image {:?} unreadable: {}",
                image_path, e
            ))
        })?;

        // Older metadata has no contentType; go by the file we found
        let content_type = metadata.content_type.unwrap_or_else(|| {
            let ext = image_path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            content_type_for_extension(ext).to_string()
        });

        debug!(path = ?image_path, size = blob.len(), "Loaded persisted image");

        Ok(Some(CacheEntry::new(
            blob,
            content_type,
            metadata.url,
            fetched_at,
        )))
    }

    /// Persist an entry: image first, then metadata
    pub async fn save(&self, entry: &CacheEntry) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let image_path = self.image_path(&entry.content_type);
        write_replace(&image_path, &entry.blob).await?;
        self.remove_other_images(&image_path).await?;

        let metadata = serde_json::to_vec_pretty(&entry.metadata())
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        write_replace(&self.metadata_path(), &metadata).await?;

        debug!(path = ?image_path, size = entry.blob.len(), "Persisted image");
        Ok(())
    }

    /// First `image.*` file in the directory, if any
    async fn find_image(&self) -> Result<Option<PathBuf>> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if is_image_file(&path) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// Drop leftovers from an earlier fetch with a different extension
    async fn remove_other_images(&self, keep: &Path) -> Result<()> {
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path != keep && is_image_file(&path) {
                let _ = fs::remove_file(&path).await;
            }
        }
        Ok(())
    }
}

fn is_image_file(path: &Path) -> bool {
    path.file_stem().and_then(|s| s.to_str()) == Some(IMAGE_STEM)
        && path.extension().is_some_and(|ext| ext != "tmp")
}

/// Write to a sibling temp file, then rename over the target
async fn write_replace(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, data).await?;
    fs::rename(&tmp, path).await
}
