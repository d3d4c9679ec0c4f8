// SPDX-License-Identifier: MIT OR Apache-2.0
//! Source adapters (C3): one per third-party review platform, plus a
//! generic adapter for webhook/import ingress.
//!
//! Adapters fetch or parse raw platform payloads and map them onto
//! normalized [`review_core::ReviewRecord`]s. They must not consult the
//! store or perform deduplication — that is the fan-out pipeline's job.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api_key_feed;
pub mod generic;
pub mod normalize;
pub mod oauth_business_profile;
pub mod partner_offset;

use async_trait::async_trait;
use review_core::ReviewRecord;
use review_error::ReviewError;

pub use api_key_feed::ApiKeyFeedAdapter;
pub use generic::GenericAdapter;
pub use oauth_business_profile::OAuthBusinessProfileAdapter;
pub use partner_offset::PartnerOffsetAdapter;

/// A source adapter: polls for new reviews or parses a push-delivered
/// payload into normalized records (`spec.md` §4.2).
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Unique adapter tag; used as `ReviewRecord::source` and as the key
    /// in scheduler/store bookkeeping.
    fn name(&self) -> &str;

    /// Whether this adapter is eligible for polling. The scheduler skips
    /// disabled adapters on startup and rejects manual polls against them
    /// with `NotFound`.
    fn enabled(&self) -> bool;

    /// One-time setup, e.g. validating credentials by performing an
    /// initial token exchange. Returns whether initialization succeeded.
    async fn initialize(&self) -> Result<bool, ReviewError>;

    /// Poll for reviews newer than `cursor`. Returns the new records and
    /// the adapter's updated cursor (`None` if the cursor is unchanged).
    async fn fetch(&self, cursor: Option<&str>) -> Result<(Vec<ReviewRecord>, Option<String>), ReviewError>;

    /// Parse a push-delivered payload (webhook or import) into records.
    fn parse(&self, raw: &serde_json::Value) -> Result<Vec<ReviewRecord>, ReviewError>;
}
