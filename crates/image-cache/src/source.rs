//! Upstream image fetching

use crate::error::{ImageCacheError, Result};
use crate::types::DEFAULT_CONTENT_TYPE;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{redirect, Client, Url};
use std::time::Duration;
use tracing::{debug, warn};

/// Redirect hops followed before giving up
pub const MAX_REDIRECTS: usize = 1;

const DEFAULT_USER_AGENT: &str = "the-project-image-cache/0.1";

/// An image as returned by upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// URL the bytes were actually served from
    pub url: String,
}

/// Something that can produce a fresh copy of the image
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self) -> Result<FetchedImage>;
}

/// Fetches the image over HTTP(S), following at most one redirect
pub struct HttpImageSource {
    client: Client,
    url: String,
}

impl HttpImageSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self) -> Result<FetchedImage> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| ImageCacheError::Upstream(format!("invalid URL {}: {}", self.url, e)))?;
        let mut redirects = 0;

        loop {
            debug!(url = %url, "Fetching image");
            let response = self.client.get(url.clone()).send().await?;
            let status = response.status();

            if status.is_redirection() {
                if redirects >= MAX_REDIRECTS {
                    warn!(url = %url, status = %status, "Redirect limit reached");
                    return Err(ImageCacheError::Upstream(format!(
                        "too many redirects (limit {}) at {}",
                        MAX_REDIRECTS, url
                    )));
                }

                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        ImageCacheError::Upstream(format!(
                            "{} from {} without a Location header",
                            status, url
                        ))
                    })?;

                let next = url.join(location).map_err(|e| {
                    ImageCacheError::Upstream(format!("bad Location {:?}: {}", location, e))
                })?;

                debug!(from = %url, to = %next, status = %status, "Following redirect");
                url = next;
                redirects += 1;
                continue;
            }

            if !status.is_success() {
                warn!(status = %status, url = %url, "Failed to fetch image");
                return Err(ImageCacheError::Upstream(format!(
                    "{} returned status {}",
                    url, status
                )));
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string();

            let bytes = response.bytes().await?.to_vec();

            debug!(
                size = bytes.len(),
                content_type = %content_type,
                url = %url,
                "Fetched image"
            );

            return Ok(FetchedImage {
                bytes,
                content_type,
                url: url.to_string(),
            });
        }
    }
}
