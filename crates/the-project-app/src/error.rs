//! Error types for the project app

use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Cache(image_cache::ImageCacheError),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Cache(err) => write!(f, "Image cache error: {}", err),
            AppError::Io(err) => write!(f, "IO error: {}", err),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Cache(err) => Some(err),
            AppError::Io(err) => Some(err.as_ref()),
            AppError::Config(_) => None,
        }
    }
}

impl From<image_cache::ImageCacheError> for AppError {
    fn from(err: image_cache::ImageCacheError) -> Self {
        AppError::Cache(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for AppError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        AppError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
