// SPDX-License-Identifier: MIT OR Apache-2.0
//! Render coordinator (C5): owns one long-lived headless-browser handle,
//! expands templates, and serves a content-addressed LRU image cache.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod browser;
pub mod lru;
pub mod template;

use browser::BrowserLease;
use futures::stream::{self, StreamExt};
use lru::Lru;
use review_core::{CacheKey, OutputFormat, RenderRequest};
use review_error::ReviewError;
use std::sync::Arc;
use template::{Branding, PlatformBadges, TemplateRegistry};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Bounded concurrency for batch rendering (`spec.md` §4.4).
pub const BATCH_CHUNK_SIZE: usize = 3;

/// Capacity of the render cache (`spec.md` §9).
pub const CACHE_CAPACITY: usize = 100;

/// A rendered image and the dimensions/format it was produced at.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    /// Output format the bytes are encoded in.
    pub format: OutputFormat,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// Whether this result came from the cache.
    pub cache_hit: bool,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    bytes: Vec<u8>,
    format: OutputFormat,
    width: u32,
    height: u32,
}

/// Owns the browser handle, the template registry, and the render cache;
/// the single entry point for turning a [`RenderRequest`] into bytes.
pub struct RenderCoordinator {
    browser: Arc<dyn BrowserLease>,
    cache: Mutex<Lru<CacheKey, CacheEntry>>,
    templates: TemplateRegistry,
    badges: PlatformBadges,
}

impl RenderCoordinator {
    /// Construct a coordinator around the given browser lease.
    pub fn new(browser: Arc<dyn BrowserLease>) -> Self {
        Self {
            browser,
            cache: Mutex::new(Lru::new(CACHE_CAPACITY)),
            templates: TemplateRegistry::with_defaults(),
            badges: PlatformBadges::defaults(),
        }
    }

    /// Names of every registered template.
    pub fn template_names(&self) -> Vec<String> {
        self.templates.names()
    }

    /// Whether the underlying browser connection is healthy, for
    /// `/health`.
    pub async fn browser_connected(&self) -> bool {
        self.browser.is_connected().await
    }

    /// Close the underlying browser connection.
    pub async fn shutdown(&self) {
        self.browser.close().await;
    }

    /// Render one request, consulting and then populating the cache.
    pub async fn render(
        &self,
        request: &RenderRequest,
        branding: &Branding,
        base_url: &str,
    ) -> Result<RenderedImage, ReviewError> {
        let cache_key = CacheKey::for_request(request);

        {
            let mut cache = self.cache.lock().await;
            if let Some(entry) = cache.get(&cache_key) {
                if entry.format == request.format {
                    return Ok(RenderedImage {
                        bytes: entry.bytes.clone(),
                        format: entry.format,
                        width: entry.width,
                        height: entry.height,
                        cache_hit: true,
                    });
                }
            }
        }

        let html = self
            .templates
            .render(&request.template, request, branding, &self.badges, base_url)?;

        let (width, height) = request.size.dimensions();
        let bytes = self.browser.capture(&html, width, height, request.format).await?;

        let entry = CacheEntry {
            bytes: bytes.clone(),
            format: request.format,
            width,
            height,
        };
        self.cache.lock().await.put(cache_key, entry);

        Ok(RenderedImage {
            bytes,
            format: request.format,
            width,
            height,
            cache_hit: false,
        })
    }

    /// Render a batch of requests, processing [`BATCH_CHUNK_SIZE`] at a
    /// time while preserving input order in the result vector.
    pub async fn render_batch(
        &self,
        requests: &[RenderRequest],
        branding: &Branding,
        base_url: &str,
    ) -> Vec<Result<RenderedImage, ReviewError>> {
        stream::iter(requests.iter())
            .map(|request| self.render(request, branding, base_url))
            .buffered(BATCH_CHUNK_SIZE)
            .collect()
            .await
    }

    /// Render asynchronously and POST the resulting bytes to
    /// `callback_url`; delivery failures are logged but not retried
    /// (`spec.md` §4.4).
    pub async fn render_callback(
        self: Arc<Self>,
        request: RenderRequest,
        branding: Branding,
        base_url: String,
        http: reqwest::Client,
    ) {
        let callback_url = match &request.callback_url {
            Some(url) => url.clone(),
            None => return,
        };

        let result = self.render(&request, &branding, &base_url).await;
        let (bytes, content_type) = match result {
            Ok(image) => (image.bytes, image.format.content_type()),
            Err(err) => {
                warn!(error = ?err, callback_url, "async render failed, not delivering");
                return;
            }
        };

        match http
            .post(&callback_url)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!(callback_url, "delivered async render result");
            }
            Ok(response) => {
                warn!(callback_url, status = %response.status(), "callback endpoint rejected delivery");
            }
            Err(err) => {
                warn!(callback_url, error = ?err, "failed to deliver async render result");
            }
        }
    }
}
