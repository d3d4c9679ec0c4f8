// SPDX-License-Identifier: MIT OR Apache-2.0
//! Render request/response shapes shared between the HTTP surface and the
//! render coordinator.

use crate::size::SizePreset;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Output image format. JPEG quality is fixed at 90 (`spec.md` §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG output.
    Png,
    /// JPEG output, quality fixed at 90.
    Jpeg,
}

impl OutputFormat {
    /// The `Content-Type` this format is served as.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// File extension (no leading dot), used in share filenames.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// Parse a format name from a query/body field.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "png" => Some(Self::Png),
            "jpeg" | "jpg" => Some(Self::Jpeg),
            _ => None,
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Png
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        })
    }
}

/// A request to render one branded review image.
///
/// Canonicalised (via [`CacheKey::for_request`]) this is also the cache
/// key's input: two requests with identical fields produce the same key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderRequest {
    /// Reviewer display name (already truncated/validated upstream).
    pub reviewer_name: String,
    /// Star rating, 0..=99 as received; clamped to 0..=5 for star display.
    pub rating: i64,
    /// Review body text.
    pub review_text: String,
    /// Technician name, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech_name: Option<String>,
    /// Technician photo URL, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech_photo_url: Option<String>,
    /// Source platform badge key, if any (e.g. `"google"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Template name to fill.
    #[serde(default = "default_template_name")]
    pub template: String,
    /// Output dimensions preset.
    #[serde(default)]
    pub size: SizePreset,
    /// Output image format.
    #[serde(default)]
    pub format: OutputFormat,
    /// Brand colour override (hex string), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_color: Option<String>,
    /// Dark brand colour override (hex string), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_color_dark: Option<String>,
    /// Logo URL override, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    /// When present, the render runs asynchronously and the result is
    /// POSTed here instead of returned in the HTTP response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

fn default_template_name() -> String {
    "default".to_string()
}

impl RenderRequest {
    /// Clamp `rating` into the `0..=5` range used for star-glyph display
    /// (distinct from the `1..=5` clamp applied when persisting a record).
    pub fn clamped_stars(&self) -> u8 {
        self.rating.clamp(0, 5) as u8
    }
}

/// Content-addressed cache key: SHA-256 over the canonical JSON of a
/// [`RenderRequest`] (excluding `callback_url`, which does not affect the
/// rendered pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(pub [u8; 32]);

impl CacheKey {
    /// Compute the cache key for a render request.
    ///
    /// `serde_json`'s default `Map` is backed by a `BTreeMap` (the
    /// `preserve_order` feature is not enabled anywhere in this
    /// workspace), so `to_value` on a struct always produces
    /// lexicographically sorted object keys — canonical JSON "for free".
    pub fn for_request(request: &RenderRequest) -> Self {
        let mut canonical = request.clone();
        canonical.callback_url = None;
        let value = serde_json::to_value(&canonical).expect("RenderRequest always serializes");
        let bytes = serde_json::to_vec(&value).expect("Value always serializes");
        let digest = Sha256::digest(&bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }

    /// Hex-encoded representation, e.g. for logging or filenames.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
