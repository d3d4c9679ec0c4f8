// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generic adapter: no polling. `parse` accepts either a bare array or
//! `{source, reviews: [...]}` and maps fields through a configurable
//! `field_mapping` before common normalisation. Used for webhook and
//! import ingress from unrecognised platforms.

use crate::normalize::{build_record, RawFields};
use crate::SourceAdapter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use review_core::config::GenericFieldMapping;
use review_core::ReviewRecord;
use review_error::ReviewError;

/// Adapter backing webhook and import ingress for platforms with no
/// dedicated integration (`spec.md` §4.2).
pub struct GenericAdapter {
    name: String,
    field_mapping: GenericFieldMapping,
}

impl GenericAdapter {
    /// Construct a generic adapter tagged `name`, using `field_mapping` to
    /// locate fields in incoming payloads.
    pub fn new(name: impl Into<String>, field_mapping: GenericFieldMapping) -> Self {
        Self {
            name: name.into(),
            field_mapping,
        }
    }

    fn field<'a>(value: &'a serde_json::Value, key: &Option<String>, default_key: &str) -> Option<&'a serde_json::Value> {
        let key = key.as_deref().unwrap_or(default_key);
        value.get(key)
    }

    fn map_one(&self, item: &serde_json::Value) -> ReviewRecord {
        let mapping = &self.field_mapping;
        let reviewer_name = Self::field(item, &mapping.reviewer_name_field, "reviewer_name")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let rating = Self::field(item, &mapping.rating_field, "rating")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        let review_text = Self::field(item, &mapping.review_text_field, "review_text")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let review_date = Self::field(item, &mapping.review_date_field, "review_date")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));
        let tech_name = Self::field(item, &mapping.tech_name_field, "tech_name")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let tech_photo_url = Self::field(item, &mapping.tech_photo_url_field, "tech_photo_url")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let fields = RawFields {
            source_token: None,
            reviewer_name,
            rating,
            review_text,
            review_date,
            tech_name,
            tech_photo_url,
        };
        build_record(&self.name, "A customer", fields, item.clone())
    }
}

#[async_trait]
impl SourceAdapter for GenericAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        false
    }

    async fn initialize(&self) -> Result<bool, ReviewError> {
        Ok(false)
    }

    async fn fetch(&self, _cursor: Option<&str>) -> Result<(Vec<ReviewRecord>, Option<String>), ReviewError> {
        Ok((Vec::new(), None))
    }

    fn parse(&self, raw: &serde_json::Value) -> Result<Vec<ReviewRecord>, ReviewError> {
        let items: Vec<&serde_json::Value> = if let Some(array) = raw.as_array() {
            array.iter().collect()
        } else if let Some(reviews) = raw.get("reviews").and_then(|v| v.as_array()) {
            reviews.iter().collect()
        } else {
            return Err(ReviewError::bad_request(
                "expected an array or {source, reviews: [...]}",
            ));
        };

        Ok(items.into_iter().map(|item| self.map_one(item)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> GenericAdapter {
        GenericAdapter::new("generic", GenericFieldMapping::default())
    }

    #[test]
    fn parse_accepts_bare_array() {
        let raw = serde_json::json!([
            {"reviewer_name": "Jane", "rating": 5, "review_text": "Great"}
        ]);
        let records = adapter().parse(&raw).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reviewer_name, "Jane");
    }

    #[test]
    fn parse_accepts_source_reviews_envelope() {
        let raw = serde_json::json!({
            "source": "acme",
            "reviews": [{"reviewer_name": "Sam", "rating": 4, "review_text": "Good"}]
        });
        let records = adapter().parse(&raw).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reviewer_name, "Sam");
    }

    #[test]
    fn parse_rejects_unrecognised_shape() {
        let raw = serde_json::json!({"unexpected": true});
        let err = adapter().parse(&raw).unwrap_err();
        assert_eq!(err.kind, review_error::ErrorKind::BadRequest);
    }

    #[test]
    fn parse_honors_custom_field_mapping() {
        let mapping = GenericFieldMapping {
            reviewer_name_field: Some("name".into()),
            rating_field: Some("stars".into()),
            review_text_field: Some("body".into()),
            ..Default::default()
        };
        let adapter = GenericAdapter::new("acme", mapping);
        let raw = serde_json::json!([{"name": "Alex", "stars": 3, "body": "Fine"}]);
        let records = adapter.parse(&raw).unwrap();
        assert_eq!(records[0].reviewer_name, "Alex");
        assert_eq!(records[0].rating, 3);
        assert_eq!(records[0].review_text, "Fine");
    }

    #[tokio::test]
    async fn fetch_never_returns_records() {
        let (records, cursor) = adapter().fetch(None).await.unwrap();
        assert!(records.is_empty());
        assert!(cursor.is_none());
    }
}
