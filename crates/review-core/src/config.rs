// SPDX-License-Identifier: MIT OR Apache-2.0
//! The configuration document loaded at process start (`spec.md` §6).
//!
//! The document is plain JSON; nothing here reads the file itself — that
//! is `review-daemon`'s job. This module only defines the shape and a
//! handful of structural validations shared by every consumer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Company/brand block, echoed by `GET /api/config` and used to fill
    /// render templates.
    pub company: CompanyConfig,
    /// Chat integration block; absent means chat sharing is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatConfig>,
    /// Ingestion pipeline configuration.
    pub ingestion: IngestionConfig,
}

/// Branding used to fill render templates and answer `GET /api/config`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyConfig {
    /// Display name.
    pub name: String,
    /// Public phone number.
    pub phone: String,
    /// Primary brand colour, e.g. `"#1a73e8"`.
    pub brand_color: String,
    /// Darker variant of the brand colour.
    pub brand_color_dark: String,
    /// Logo URL (may be relative; resolved against a base URL at render
    /// time).
    pub logo_url: String,
}

/// Chat workspace integration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatConfig {
    /// Bot token used to authenticate against the chat API.
    pub bot_token: String,
    /// Target channel identifier.
    pub channel: String,
    /// Maps a technician's display name (case-insensitively) to the
    /// chat-native mention syntax for that person.
    #[serde(default)]
    pub technicians: BTreeMap<String, String>,
}

impl ChatConfig {
    /// Case-insensitive technician mention lookup.
    pub fn mention_for(&self, tech_name: &str) -> Option<&str> {
        let needle = tech_name.to_lowercase();
        self.technicians
            .iter()
            .find(|(name, _)| name.to_lowercase() == needle)
            .map(|(_, mention)| mention.as_str())
    }
}

/// Ingestion pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestionConfig {
    /// Master on/off switch for the whole ingestion subsystem.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Auto-render a branded image for every newly accepted review.
    #[serde(default)]
    pub auto_generate: bool,
    /// Auto-share rendered images to chat.
    #[serde(default)]
    pub auto_share: bool,
    /// Minimum rating required for auto-share (default 4).
    #[serde(default = "default_min_rating_for_auto_share")]
    pub min_rating_for_auto_share: u8,
    /// Template used for auto-generated renders.
    #[serde(default = "default_template")]
    pub default_template: String,
    /// Size preset used for auto-generated renders (a [`crate::size::SizePreset`]
    /// name; validated by whoever loads this document).
    #[serde(default = "default_size_name")]
    pub default_size: String,
    /// Global minimum poll interval, in minutes, applied across all
    /// sources (`spec.md` §4.3: `base = max(adapter.poll_interval,
    /// global_interval, 15 min)`).
    #[serde(default = "default_poll_interval_minutes")]
    pub poll_interval_minutes: u64,
    /// Path to the persistent store document on disk.
    pub data_path: String,
    /// Named per-source adapter configuration.
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
    /// Configuration for the generic/webhook/import adapter.
    #[serde(default)]
    pub generic: GenericAdapterConfig,
}

fn default_true() -> bool {
    true
}

fn default_min_rating_for_auto_share() -> u8 {
    4
}

fn default_template() -> String {
    "default".to_string()
}

fn default_poll_interval_minutes() -> u64 {
    15
}

fn default_size_name() -> String {
    "square".to_string()
}

/// Per-source-adapter configuration. The core only reads the fields
/// below; everything else is an opaque, adapter-specific blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Whether this adapter should be initialized and polled.
    #[serde(default)]
    pub enabled: bool,
    /// Poll interval override, in minutes (subject to the global floor).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_minutes: Option<u64>,
    /// HMAC secret for webhook ingress, if this adapter accepts webhooks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
    /// Adapter-specific credentials/identifiers, opaque to the core.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Field mapping for the generic adapter's `parse` operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GenericFieldMapping {
    /// Source field to read as `reviewer_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_name_field: Option<String>,
    /// Source field to read as `rating`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_field: Option<String>,
    /// Source field to read as `review_text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_text_field: Option<String>,
    /// Source field to read as `review_date`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_date_field: Option<String>,
    /// Source field to read as `tech_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech_name_field: Option<String>,
    /// Source field to read as `tech_photo_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech_photo_url_field: Option<String>,
}

/// Configuration for the generic (webhook/import) adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GenericAdapterConfig {
    /// Field mapping applied before common normalisation.
    #[serde(default)]
    pub field_mapping: GenericFieldMapping,
}
