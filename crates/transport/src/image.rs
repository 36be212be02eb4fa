//! Image resolution — turns URL image references into inline base64 data.
//!
//! Screenshots are usually uploaded and referenced by URL. Model backends
//! want the bytes, so every URL item is fetched (with backoff) and replaced
//! by an inline item. Results are kept in a small LRU keyed by URL: the
//! same screenshot shows up in several consecutive windows and should only
//! be downloaded once.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use screenpilot_core::error::TransportError;
use screenpilot_core::message::{AgentMessage, ContentItem, ImageSource};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use crate::lru::BoundedCache;
use crate::retry::{RetryPolicy, retry};

/// Raw bytes of a downloaded image.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// Downloads an image by URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, TransportError>;
}

/// [`ImageFetcher`] over HTTP.
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, TransportError> {
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                TransportError::Timeout { url: url.to_string() }
            } else {
                TransportError::Network {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let response = self.client.get(url).send().await.map_err(map_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or_else(|| "image/png".to_string());

        let bytes = response.bytes().await.map_err(map_err)?;
        if bytes.is_empty() {
            return Err(TransportError::InvalidPayload {
                url: url.to_string(),
                reason: "empty body".into(),
            });
        }

        Ok(FetchedImage {
            media_type,
            bytes: bytes.to_vec(),
        })
    }
}

/// Resolves URL images to inline data through a shared LRU cache.
pub struct ImageResolver {
    fetcher: Arc<dyn ImageFetcher>,
    cache: Mutex<BoundedCache<String, ImageSource>>,
    policy: RetryPolicy,
}

impl ImageResolver {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, cache_capacity: usize, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            cache: Mutex::new(BoundedCache::new(cache_capacity)),
            policy,
        }
    }

    pub fn fetcher(&self) -> Arc<dyn ImageFetcher> {
        Arc::clone(&self.fetcher)
    }

    pub fn capacity(&self) -> usize {
        self.cache.lock().map(|c| c.capacity()).unwrap_or(1)
    }

    /// Number of cached images.
    pub fn cached(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Resolve one URL to inline data.
    pub async fn resolve_url(&self, url: &str) -> Result<ImageSource, TransportError> {
        if let Some(hit) = self.cache_get(url) {
            return Ok(hit);
        }

        let fetched = retry(self.policy, TransportError::is_retryable, || self.fetcher.fetch(url)).await?;
        debug!(url, bytes = fetched.bytes.len(), "Fetched image");

        let resolved = ImageSource::Base64 {
            media_type: fetched.media_type,
            data: STANDARD.encode(&fetched.bytes),
        };
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(url.to_string(), resolved.clone());
        }
        Ok(resolved)
    }

    /// Replace every URL image in `messages` with inline data.
    pub async fn resolve_messages(
        &self,
        messages: Vec<AgentMessage>,
    ) -> Result<Vec<AgentMessage>, TransportError> {
        let mut resolved = Vec::with_capacity(messages.len());
        for message in messages {
            let message = match message {
                AgentMessage::User { content } => {
                    let mut items = Vec::with_capacity(content.len());
                    for item in content {
                        let item = match item {
                            ContentItem::Image { image: ImageSource::Url(url) } => {
                                ContentItem::image(self.resolve_url(&url).await?)
                            }
                            other => other,
                        };
                        items.push(item);
                    }
                    AgentMessage::User { content: items }
                }
                assistant @ AgentMessage::Assistant { .. } => assistant,
            };
            resolved.push(message);
        }
        Ok(resolved)
    }

    fn cache_get(&self, url: &str) -> Option<ImageSource> {
        let mut cache = self.cache.lock().ok()?;
        cache.get(&url.to_string()).cloned()
    }
}
