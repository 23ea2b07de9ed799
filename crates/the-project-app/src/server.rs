//! HTTP server for the project app
//!
//! Provides `/` (page with the cached image) and `/healthz`.

use crate::page::render_index;
use crate::types::HealthResponse;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use image_cache::ImageCache;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

/// Shared state for the HTTP server
pub struct ServerState {
    pub cache: ImageCache,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(cache: ImageCache) -> Self {
        Self {
            cache,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(health))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server started in port {}", port);
    axum::serve(listener, router).await
}

/// Index page with the cached image, or a loading page when there is none
async fn index(State(state): State<SharedState>) -> Html<String> {
    let image = state.cache.get_image().await;
    if image.is_none() {
        debug!("No image available, rendering loading page");
    }
    Html(render_index(image.as_deref()))
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let cache = state.cache.stats().await;
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache,
    })
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain")],
        "Not Found",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use image_cache::{CachePolicy, DiskStore, HttpImageSource};
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;
    use tower::ServiceExt;

    async fn spawn_upstream() -> String {
        let upstream = Router::new()
            .route(
                "/random",
                get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/id/7.png")]) }),
            )
            .route(
                "/id/7.png",
                get(|| async { ([(header::CONTENT_TYPE, "image/png")], b"png-bytes".to_vec()) }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, upstream).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn unreachable_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/random", addr)
    }

    async fn create_test_state(image_url: String, cache_dir: &Path) -> SharedState {
        let source = HttpImageSource::new(image_url, Duration::from_secs(5)).unwrap();
        let cache = ImageCache::new(
            Arc::new(source),
            DiskStore::new(cache_dir),
            CachePolicy::default(),
        );
        cache.init().await;
        Arc::new(ServerState::new(cache))
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_index_embeds_image() {
        let dir = tempdir().unwrap();
        let base = spawn_upstream().await;
        let state = create_test_state(format!("{}/random", base), dir.path()).await;
        let router = create_router(state.clone());

        let (status, content_type, body) = get_body(router, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/html"));
        // base64("png-bytes")
        assert!(body.contains("data:image/png;base64,cG5nLWJ5dGVz"));

        let entry = state.cache.current().await.unwrap();
        assert_eq!(entry.source_url, format!("{}/id/7.png", base));
        assert!(dir.path().join("image.png").exists());
        assert!(dir.path().join("metadata.json").exists());
    }

    #[tokio::test]
    async fn test_index_loading_when_upstream_down() {
        let dir = tempdir().unwrap();
        let state = create_test_state(unreachable_url().await, dir.path()).await;
        let router = create_router(state);

        let (status, content_type, body) = get_body(router, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/html"));
        assert!(body.contains("loading"));
        assert!(!body.contains("<img"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempdir().unwrap();
        let state = create_test_state(unreachable_url().await, dir.path()).await;
        let router = create_router(state);

        let (status, _, body) = get_body(router, "/healthz").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].as_u64().is_some());
        assert_eq!(json["cache"]["has_entry"], false);
        assert_eq!(json["cache"]["fetches"], 0);
    }

    #[tokio::test]
    async fn test_unknown_path_not_found() {
        let dir = tempdir().unwrap();
        let state = create_test_state(unreachable_url().await, dir.path()).await;
        let router = create_router(state);

        let (status, content_type, body) = get_body(router, "/todos").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(content_type.as_deref(), Some("text/plain"));
        assert_eq!(body, "Not Found");
    }

    #[tokio::test]
    async fn test_start_server_port_in_use_is_io_error() {
        let dir = tempdir().unwrap();
        let state = create_test_state(unreachable_url().await, dir.path()).await;

        let taken = tokio::net::TcpListener::bind("0.0.0.0:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = start_server(state, port).await.unwrap_err();
        let err: crate::error::AppError = err.into();
        assert!(matches!(err, crate::error::AppError::Io(_)));
    }

    #[tokio::test]
    async fn test_server_state_new() {
        let dir = tempdir().unwrap();
        let state = create_test_state(unreachable_url().await, dir.path()).await;

        let diff = (Utc::now() - state.started_at).num_seconds();
        assert!((0..5).contains(&diff));
    }
}
