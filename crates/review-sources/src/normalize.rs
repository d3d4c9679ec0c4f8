// SPDX-License-Identifier: MIT OR Apache-2.0
//! Normalisation invariants shared by every adapter (`spec.md` §4.2):
//! rating clamped to `1..=5`, missing text becomes `""`, missing date
//! defaults to "now", missing name falls back to a source-specific
//! placeholder.

use chrono::{DateTime, Utc};
use review_core::record::{clamp_rating_for_storage, truncate_chars, Identity, MAX_REVIEWER_NAME_LEN, MAX_REVIEW_TEXT_LEN};
use review_core::ReviewRecord;

/// Raw, loosely-typed fields an adapter extracts from a platform payload
/// before common normalisation is applied.
#[derive(Debug, Clone, Default)]
pub struct RawFields {
    /// Source-supplied identifier, if the platform provides one.
    pub source_token: Option<String>,
    /// Reviewer display name, if present.
    pub reviewer_name: Option<String>,
    /// Raw rating as reported by the platform (not yet clamped).
    pub rating: i64,
    /// Review body text, if present.
    pub review_text: Option<String>,
    /// Review timestamp, if present.
    pub review_date: Option<DateTime<Utc>>,
    /// Technician name, if the payload carries one.
    pub tech_name: Option<String>,
    /// Technician photo URL, if the payload carries one.
    pub tech_photo_url: Option<String>,
}

/// Build a normalized [`ReviewRecord`] from [`RawFields`], applying the
/// cross-adapter invariants and stamping `source`/`raw`.
pub fn build_record(source: &str, placeholder_name: &str, fields: RawFields, raw: serde_json::Value) -> ReviewRecord {
    let reviewer_name = truncate_chars(
        &fields
            .reviewer_name
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| placeholder_name.to_string()),
        MAX_REVIEWER_NAME_LEN,
    );
    let review_text = truncate_chars(&fields.review_text.unwrap_or_default(), MAX_REVIEW_TEXT_LEN);
    let rating = clamp_rating_for_storage(fields.rating);
    let review_date = fields.review_date.unwrap_or_else(Utc::now);
    let id = Identity::derive(source, fields.source_token.as_deref(), &reviewer_name, &review_text, rating);

    ReviewRecord {
        id,
        source: source.to_string(),
        reviewer_name,
        rating,
        review_text,
        review_date,
        tech_name: fields.tech_name,
        tech_photo_url: fields.tech_photo_url,
        raw,
        processed_at: None,
        image_generated: false,
        chat_shared: false,
        partial: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_name_falls_back_to_placeholder() {
        let record = build_record("google", "Anonymous customer", RawFields::default(), serde_json::json!({}));
        assert_eq!(record.reviewer_name, "Anonymous customer");
    }

    #[test]
    fn missing_text_becomes_empty_string() {
        let record = build_record("google", "Anonymous", RawFields::default(), serde_json::json!({}));
        assert_eq!(record.review_text, "");
    }

    #[test]
    fn rating_is_clamped() {
        let fields = RawFields { rating: 0, ..Default::default() };
        let record = build_record("google", "Anonymous", fields, serde_json::json!({}));
        assert_eq!(record.rating, 1);
    }

    #[test]
    fn missing_date_defaults_to_now() {
        let before = Utc::now();
        let record = build_record("google", "Anonymous", RawFields::default(), serde_json::json!({}));
        assert!(record.review_date >= before);
    }
}
