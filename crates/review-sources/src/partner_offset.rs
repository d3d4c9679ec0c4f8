// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bearer-token partner adapter: offset-based pagination. The cursor is
//! `"offset:<N>"`, which advances by the number of items returned on each
//! fetch.

use crate::normalize::{build_record, RawFields};
use crate::SourceAdapter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use review_core::ReviewRecord;
use review_error::ReviewError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

const PAGE_SIZE: u64 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RemoteItem {
    id: Option<String>,
    customer_name: Option<String>,
    score: Option<i64>,
    body: Option<String>,
    posted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct PartnerResponse {
    #[serde(default)]
    items: Vec<RemoteItem>,
}

/// Credentials and endpoint for the bearer-token partner adapter.
#[derive(Debug, Clone)]
pub struct PartnerOffsetConfig {
    /// Adapter tag.
    pub name: String,
    /// Bearer token used on every request.
    pub bearer_token: String,
    /// Endpoint supporting `?offset=&limit=` pagination.
    pub endpoint: String,
}

/// Adapter for partner integrations that paginate by numeric offset
/// (`spec.md` §4.2).
pub struct PartnerOffsetAdapter {
    config: PartnerOffsetConfig,
    http: reqwest::Client,
    enabled: AtomicBool,
}

impl PartnerOffsetAdapter {
    /// Construct a new adapter, disabled until [`SourceAdapter::initialize`]
    /// succeeds.
    pub fn new(config: PartnerOffsetConfig, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            enabled: AtomicBool::new(false),
        }
    }

    /// Parse an `"offset:<N>"` cursor, defaulting to 0 when absent or
    /// malformed.
    fn parse_offset(cursor: Option<&str>) -> u64 {
        cursor
            .and_then(|c| c.strip_prefix("offset:"))
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }

    fn map_item(&self, item: RemoteItem, raw: serde_json::Value) -> ReviewRecord {
        let fields = RawFields {
            source_token: item.id,
            reviewer_name: item.customer_name,
            rating: item.score.unwrap_or(0),
            review_text: item.body,
            review_date: item.posted_at,
            tech_name: None,
            tech_photo_url: None,
        };
        build_record(&self.config.name, "A customer", fields, raw)
    }
}

#[async_trait]
impl SourceAdapter for PartnerOffsetAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    async fn initialize(&self) -> Result<bool, ReviewError> {
        self.enabled.store(true, Ordering::Release);
        Ok(true)
    }

    async fn fetch(&self, cursor: Option<&str>) -> Result<(Vec<ReviewRecord>, Option<String>), ReviewError> {
        let offset = Self::parse_offset(cursor);
        let response = self
            .http
            .get(&self.config.endpoint)
            .bearer_auth(&self.config.bearer_token)
            .query(&[("offset", offset), ("limit", PAGE_SIZE)])
            .send()
            .await
            .map_err(|err| {
                ReviewError::upstream("partner fetch failed")
                    .with_context("source", self.config.name.clone())
                    .with_source(err)
            })?;

        if !response.status().is_success() {
            return Err(ReviewError::upstream("partner fetch rejected")
                .with_context("source", self.config.name.clone())
                .with_context("status", response.status().as_u16()));
        }

        let body: PartnerResponse = response.json().await.map_err(|err| {
            ReviewError::upstream("partner response malformed")
                .with_context("source", self.config.name.clone())
                .with_source(err)
        })?;

        let count = body.items.len() as u64;
        let records = body
            .items
            .into_iter()
            .map(|item| {
                let raw = serde_json::to_value(&item).unwrap_or(serde_json::Value::Null);
                self.map_item(item, raw)
            })
            .collect::<Vec<_>>();

        debug!(source = %self.config.name, offset, count, "fetched partner page");
        let new_cursor = if count > 0 {
            Some(format!("offset:{}", offset + count))
        } else {
            None
        };
        Ok((records, new_cursor))
    }

    fn parse(&self, _raw: &serde_json::Value) -> Result<Vec<ReviewRecord>, ReviewError> {
        Err(ReviewError::bad_request("bearer-token partner adapter does not accept push ingress")
            .with_context("source", self.config.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_offset_defaults_to_zero() {
        assert_eq!(PartnerOffsetAdapter::parse_offset(None), 0);
        assert_eq!(PartnerOffsetAdapter::parse_offset(Some("garbage")), 0);
        assert_eq!(PartnerOffsetAdapter::parse_offset(Some("offset:42")), 42);
    }

    fn config() -> PartnerOffsetConfig {
        PartnerOffsetConfig {
            name: "partnerco".into(),
            bearer_token: "token".into(),
            endpoint: "https://example.invalid/partner".into(),
        }
    }

    #[test]
    fn map_item_builds_record() {
        let adapter = PartnerOffsetAdapter::new(config(), reqwest::Client::new());
        let item = RemoteItem {
            id: Some("abc".into()),
            customer_name: Some("Robin".into()),
            score: Some(3),
            body: Some("Fine".into()),
            posted_at: Some(Utc::now()),
        };
        let record = adapter.map_item(item, serde_json::json!({}));
        assert_eq!(record.id, "partnerco:abc");
        assert_eq!(record.rating, 3);
    }
}
