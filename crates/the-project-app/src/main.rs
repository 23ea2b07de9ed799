//! The Project app - page service with a cached random image
//!
//! Serves a single page embedding an image pulled from an upstream provider.
//! The image is cached on disk and refreshed according to its age.

mod config;
mod error;
mod page;
mod server;
mod types;

use crate::config::Config;
use crate::error::Result;
use crate::server::{start_server, ServerState, SharedState};
use image_cache::{DiskStore, HttpImageSource, ImageCache};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("the_project_app=info".parse()?)
        .add_directive("image_cache=info".parse()?);

    // Use JSON format for cloud logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting the project app...");

    let config = Config::from_env();
    info!("Port: {}", config.port);
    info!("Image URL: {}", config.image_url);
    info!("Cache dir: {:?}", config.cache_dir);
    info!(
        "Image fresh for {} seconds, refresh mode {}",
        config.fresh_for.as_secs(),
        config.refresh_mode
    );

    let source = HttpImageSource::new(config.image_url.clone(), config.fetch_timeout)?;
    let cache = ImageCache::new(
        Arc::new(source),
        DiskStore::new(config.cache_dir.clone()),
        config.cache_policy(),
    );
    cache.init().await;

    let state: SharedState = Arc::new(ServerState::new(cache));

    // Start HTTP server (blocking)
    start_server(state, config.port).await?;

    Ok(())
}
