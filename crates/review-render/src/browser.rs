// SPDX-License-Identifier: MIT OR Apache-2.0
//! The headless-browser capability contract: a render-coordinator-owned
//! resource, created once and leased per request (`spec.md` §9, replacing
//! a shared mutable "browser" handle with lazy init).
//!
//! Driving an actual browser is out of this workspace's scope; [`MockBrowser`]
//! renders a deterministic placeholder image so the coordinator's caching,
//! templating, and concurrency behaviour can be exercised without one.

use async_trait::async_trait;
use image::{ImageEncoder, Rgb, RgbImage};
use review_core::OutputFormat;
use review_error::ReviewError;
use std::sync::atomic::{AtomicBool, Ordering};

/// A leasable headless-browser capability: render `html` at `width`×`height`
/// and capture it as encoded image bytes in `format`.
#[async_trait]
pub trait BrowserLease: Send + Sync {
    /// Whether the underlying browser connection is currently healthy.
    async fn is_connected(&self) -> bool;

    /// Load `html` into a fresh page, wait for it to go idle, and capture
    /// a `width`×`height` clip in `format`.
    async fn capture(&self, html: &str, width: u32, height: u32, format: OutputFormat) -> Result<Vec<u8>, ReviewError>;

    /// Close the underlying browser connection.
    async fn close(&self);
}

/// A deterministic stand-in for a real headless browser. Produces a
/// solid-colour image (derived from the HTML's length, so different
/// inputs are visibly different in tests) of the requested dimensions.
pub struct MockBrowser {
    connected: AtomicBool,
}

impl MockBrowser {
    /// Construct a mock browser, already "connected".
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
        }
    }
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserLease for MockBrowser {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn capture(&self, html: &str, width: u32, height: u32, format: OutputFormat) -> Result<Vec<u8>, ReviewError> {
        if !self.is_connected().await {
            self.connected.store(true, Ordering::Release);
        }

        let seed = html.len() as u8;
        let pixel = Rgb([seed, seed.wrapping_mul(3), seed.wrapping_mul(7)]);
        let image = RgbImage::from_pixel(width, height, pixel);

        let mut bytes = Vec::new();
        match format {
            OutputFormat::Png => {
                let encoder = image::codecs::png::PngEncoder::new(&mut bytes);
                encoder
                    .write_image(&image, width, height, image::ExtendedColorType::Rgb8)
                    .map_err(|err| ReviewError::internal("png encode failed").with_source(err))?;
            }
            OutputFormat::Jpeg => {
                let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, 90);
                encoder
                    .write_image(&image, width, height, image::ExtendedColorType::Rgb8)
                    .map_err(|err| ReviewError::internal("jpeg encode failed").with_source(err))?;
            }
        }

        Ok(bytes)
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::Release);
    }
}
