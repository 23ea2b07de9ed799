//! Error types for the image cache

use std::fmt;

#[derive(Debug)]
pub enum ImageCacheError {
    /// Transport failure reaching upstream
    Http(Box<reqwest::Error>),
    /// Upstream answered, but not with an image we can use
    Upstream(String),
    /// Writing the blob or metadata to disk failed
    Persistence(Box<std::io::Error>),
    /// Persisted metadata is missing pieces or unreadable
    MetadataParse(String),
}

impl ImageCacheError {
    /// True for errors raised while talking to upstream
    pub fn is_fetch(&self) -> bool {
        matches!(self, ImageCacheError::Http(_) | ImageCacheError::Upstream(_))
    }
}

impl fmt::Display for ImageCacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageCacheError::Http(err) => write!(f, "HTTP error: {}", err),
            ImageCacheError::Upstream(msg) => write!(f, "Upstream error: {}", msg),
            ImageCacheError::Persistence(err) => write!(f, "Persistence error: {}", err),
            ImageCacheError::MetadataParse(msg) => write!(f, "Metadata parse error: {}", msg),
        }
    }
}

impl std::error::Error for ImageCacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageCacheError::Http(err) => Some(err.as_ref()),
            ImageCacheError::Persistence(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ImageCacheError {
    fn from(err: reqwest::Error) -> Self {
        ImageCacheError::Http(Box::new(err))
    }
}

impl From<std::io::Error> for ImageCacheError {
    fn from(err: std::io::Error) -> Self {
        ImageCacheError::Persistence(Box::new(err))
    }
}

impl From<serde_json::Error> for ImageCacheError {
    fn from(err: serde_json::Error) -> Self {
        ImageCacheError::MetadataParse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ImageCacheError>;
