// SPDX-License-Identifier: MIT OR Apache-2.0
//! The normalized review record and its identity derivation rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum length, in characters, of `reviewer_name`.
pub const MAX_REVIEWER_NAME_LEN: usize = 100;
/// Maximum length, in characters, of `review_text`.
pub const MAX_REVIEW_TEXT_LEN: usize = 2000;

/// The uniform, normalized shape every ingestion path maps onto.
///
/// See `spec.md` §3 for field semantics. `raw` retains the opaque
/// source payload for debugging/audit; nothing in this workspace reads
/// it back out again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewRecord {
    /// Globally unique, derived identifier: `"<source>:<token>"`.
    pub id: String,
    /// Short source tag: a known platform key, `"generic"`, or `"import"`.
    pub source: String,
    /// Reviewer display name, truncated to [`MAX_REVIEWER_NAME_LEN`].
    pub reviewer_name: String,
    /// Star rating, clamped to `1..=5` at normalization time.
    pub rating: u8,
    /// Review body, truncated to [`MAX_REVIEW_TEXT_LEN`].
    pub review_text: String,
    /// UTC timestamp the review was left.
    pub review_date: DateTime<Utc>,
    /// Technician name, if the source/record carries one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tech_name: Option<String>,
    /// Technician photo URL, if the source/record carries one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tech_photo_url: Option<String>,
    /// Opaque source payload, preserved verbatim.
    pub raw: serde_json::Value,

    /// Timestamp the fan-out pipeline finished processing this record.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub processed_at: Option<DateTime<Utc>>,
    /// Whether a branded image has been generated for this record.
    #[serde(default)]
    pub image_generated: bool,
    /// Whether this record's image has been shared to chat.
    #[serde(default)]
    pub chat_shared: bool,
    /// Set by the API-key review-feed adapter: the source returns excerpts
    /// rather than full review text.
    #[serde(default)]
    pub partial: bool,
}

impl ReviewRecord {
    /// Mutable processing-flag fields a pipeline step may merge in.
    pub fn apply_flags(&mut self, flags: ProcessingFlags) {
        if let Some(processed_at) = flags.processed_at {
            self.processed_at = Some(processed_at);
        }
        if let Some(image_generated) = flags.image_generated {
            self.image_generated = image_generated;
        }
        if let Some(chat_shared) = flags.chat_shared {
            self.chat_shared = chat_shared;
        }
    }

    /// The timestamp `recent()` sorts by: `review_date`, falling back to
    /// `processed_at` when absent is never true for `review_date` (it's
    /// non-optional) — kept for symmetry with the prune cutoff, which
    /// does fall back.
    pub fn sort_timestamp(&self) -> DateTime<Utc> {
        self.review_date
    }

    /// The timestamp pruning measures age against: `review_date`, or
    /// `processed_at` if that is somehow more recent information (per
    /// spec §8, "review_date (or processed_at fallback)").
    pub fn prune_timestamp(&self) -> DateTime<Utc> {
        match self.processed_at {
            Some(p) if p > self.review_date => p,
            _ => self.review_date,
        }
    }
}

/// A set of processing flags to merge into a stored record. `None` means
/// "leave this field unchanged".
#[derive(Debug, Clone, Default)]
pub struct ProcessingFlags {
    /// New `processed_at` value, if the step wants to stamp it.
    pub processed_at: Option<DateTime<Utc>>,
    /// New `image_generated` value.
    pub image_generated: Option<bool>,
    /// New `chat_shared` value.
    pub chat_shared: Option<bool>,
}

impl ProcessingFlags {
    /// Mark that an image was generated, stamping `processed_at` to now.
    pub fn generated(now: DateTime<Utc>) -> Self {
        Self {
            processed_at: Some(now),
            image_generated: Some(true),
            chat_shared: None,
        }
    }

    /// Mark that the image was shared to chat, stamping `processed_at` to
    /// now.
    pub fn shared(now: DateTime<Utc>) -> Self {
        Self {
            processed_at: Some(now),
            image_generated: None,
            chat_shared: Some(true),
        }
    }
}

/// Derives the identity (`id`) of a review record per `spec.md` §3:
///
/// `id = "<source>:<token>"`, where `token` is either a source-supplied
/// identifier or, when absent, the first 16 hex characters of
/// `SHA-256("<source>:<reviewer_name>:<review_text>:<rating>")`.
pub struct Identity;

impl Identity {
    /// Build the `id` field for a normalized record.
    pub fn derive(
        source: &str,
        source_token: Option<&str>,
        reviewer_name: &str,
        review_text: &str,
        rating: u8,
    ) -> String {
        let token = match source_token {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => Self::fallback_token(source, reviewer_name, review_text, rating),
        };
        format!("{source}:{token}")
    }

    /// The first-16-hex-char fallback token derived from content.
    pub fn fallback_token(source: &str, reviewer_name: &str, review_text: &str, rating: u8) -> String {
        let input = format!("{source}:{reviewer_name}:{review_text}:{rating}");
        let digest = Sha256::digest(input.as_bytes());
        hex_prefix(&digest, 16)
    }
}

fn hex_prefix(bytes: &[u8], chars: usize) -> String {
    let mut s = String::with_capacity(chars);
    for byte in bytes {
        if s.len() >= chars {
            break;
        }
        s.push_str(&format!("{byte:02x}"));
    }
    s.truncate(chars);
    s
}

/// Clamp a raw rating into the persisted record's valid range, `1..=5`.
pub fn clamp_rating_for_storage(rating: i64) -> u8 {
    rating.clamp(1, 5) as u8
}

/// Truncate a string to at most `max_chars` Unicode scalar values.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_uses_source_token_when_present() {
        let id = Identity::derive("google", Some("abc123"), "Jane", "Great", 5);
        assert_eq!(id, "google:abc123");
    }

    #[test]
    fn identity_falls_back_to_content_hash() {
        let id = Identity::derive("generic", None, "Jane D.", "Excellent", 5);
        assert!(id.starts_with("generic:"));
        let token = id.strip_prefix("generic:").unwrap();
        assert_eq!(token.len(), 16);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn identity_is_deterministic() {
        let a = Identity::derive("generic", None, "Jane D.", "Excellent", 5);
        let b = Identity::derive("generic", None, "Jane D.", "Excellent", 5);
        assert_eq!(a, b);
    }

    #[test]
    fn identity_changes_with_any_field() {
        let base = Identity::derive("generic", None, "Jane D.", "Excellent", 5);
        let diff_rating = Identity::derive("generic", None, "Jane D.", "Excellent", 4);
        let diff_text = Identity::derive("generic", None, "Jane D.", "Great", 5);
        assert_ne!(base, diff_rating);
        assert_ne!(base, diff_text);
    }

    #[test]
    fn rating_clamped_for_storage() {
        assert_eq!(clamp_rating_for_storage(0), 1);
        assert_eq!(clamp_rating_for_storage(6), 5);
        assert_eq!(clamp_rating_for_storage(3), 3);
        assert_eq!(clamp_rating_for_storage(-10), 1);
        assert_eq!(clamp_rating_for_storage(99), 5);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = truncate_chars("hello world", 5);
        assert_eq!(s, "hello");
        let short = truncate_chars("hi", 5);
        assert_eq!(short, "hi");
    }

    #[test]
    fn prune_timestamp_prefers_later_processed_at() {
        let mut record = sample_record();
        record.processed_at = None;
        assert_eq!(record.prune_timestamp(), record.review_date);
    }

    fn sample_record() -> ReviewRecord {
        ReviewRecord {
            id: "generic:abc".into(),
            source: "generic".into(),
            reviewer_name: "Jane".into(),
            rating: 5,
            review_text: "Great".into(),
            review_date: Utc::now(),
            tech_name: None,
            tech_photo_url: None,
            raw: serde_json::json!({}),
            processed_at: None,
            image_generated: false,
            chat_shared: false,
            partial: false,
        }
    }

    #[test]
    fn apply_flags_merges_generated() {
        let mut record = sample_record();
        let now = Utc::now();
        record.apply_flags(ProcessingFlags::generated(now));
        assert!(record.image_generated);
        assert!(!record.chat_shared);
        assert_eq!(record.processed_at, Some(now));
    }
}
