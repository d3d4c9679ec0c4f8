// SPDX-License-Identifier: MIT OR Apache-2.0
//! OAuth business-profile adapter: refreshes access tokens on demand,
//! maps `ONE..FIVE` star enums, and derives its cursor from the maximum
//! `update_time`/`create_time` seen in a response.

use crate::normalize::{build_record, RawFields};
use crate::SourceAdapter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use review_core::ReviewRecord;
use review_error::ReviewError;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Margin, before expiry, at which a cached access token is considered
/// stale and must be refreshed.
const EXPIRY_MARGIN: chrono::Duration = chrono::Duration::seconds(60);

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct ReviewsResponse {
    #[serde(default)]
    reviews: Vec<RemoteReview>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct RemoteReview {
    review_id: Option<String>,
    reviewer: Option<Reviewer>,
    star_rating: Option<String>,
    comment: Option<String>,
    create_time: Option<DateTime<Utc>>,
    update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct Reviewer {
    display_name: Option<String>,
}

fn star_rating_to_int(rating: &str) -> i64 {
    match rating.to_ascii_uppercase().as_str() {
        "ONE" => 1,
        "TWO" => 2,
        "THREE" => 3,
        "FOUR" => 4,
        "FIVE" => 5,
        _ => 0,
    }
}

/// Credentials and endpoints for the OAuth business-profile adapter.
#[derive(Debug, Clone)]
pub struct OAuthBusinessProfileConfig {
    /// Adapter tag, e.g. `"google"`.
    pub name: String,
    /// Token endpoint used for refresh-token exchange.
    pub token_endpoint: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
    /// Endpoint returning the business's reviews.
    pub reviews_endpoint: String,
}

/// Adapter for platforms exposing an OAuth2 business-profile reviews API
/// (`spec.md` §4.2).
pub struct OAuthBusinessProfileAdapter {
    config: OAuthBusinessProfileConfig,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
    enabled: AtomicBool,
}

impl OAuthBusinessProfileAdapter {
    /// Construct a new adapter, disabled until [`SourceAdapter::initialize`]
    /// succeeds.
    pub fn new(config: OAuthBusinessProfileConfig, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            token: Mutex::new(None),
            enabled: AtomicBool::new(false),
        }
    }

    async fn access_token(&self) -> Result<String, ReviewError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Utc::now() > EXPIRY_MARGIN {
                return Ok(token.access_token.clone());
            }
        }

        let response = self
            .http
            .post(&self.config.token_endpoint)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", self.config.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|err| {
                ReviewError::upstream("oauth token refresh failed")
                    .with_context("source", self.config.name.clone())
                    .with_source(err)
            })?;

        if !response.status().is_success() {
            return Err(ReviewError::upstream("oauth token refresh rejected")
                .with_context("source", self.config.name.clone())
                .with_context("status", response.status().as_u16()));
        }

        let body: TokenResponse = response.json().await.map_err(|err| {
            ReviewError::upstream("oauth token response malformed")
                .with_context("source", self.config.name.clone())
                .with_source(err)
        })?;

        let fresh = CachedToken {
            access_token: body.access_token.clone(),
            expires_at: Utc::now() + chrono::Duration::seconds(body.expires_in),
        };
        *cached = Some(fresh.clone());
        Ok(fresh.access_token)
    }

    fn map_review(&self, remote: RemoteReview, raw: serde_json::Value) -> ReviewRecord {
        let rating = remote
            .star_rating
            .as_deref()
            .map(star_rating_to_int)
            .unwrap_or(0);
        let fields = RawFields {
            source_token: remote.review_id,
            reviewer_name: remote.reviewer.and_then(|r| r.display_name),
            rating,
            review_text: remote.comment,
            review_date: remote.update_time.or(remote.create_time),
            tech_name: None,
            tech_photo_url: None,
        };
        build_record(&self.config.name, "A customer", fields, raw)
    }
}

#[async_trait]
impl SourceAdapter for OAuthBusinessProfileAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    async fn initialize(&self) -> Result<bool, ReviewError> {
        match self.access_token().await {
            Ok(_) => {
                self.enabled.store(true, Ordering::Release);
                Ok(true)
            }
            Err(err) => {
                warn!(source = %self.config.name, error = ?err, "oauth adapter failed to initialize");
                self.enabled.store(false, Ordering::Release);
                Ok(false)
            }
        }
    }

    async fn fetch(&self, cursor: Option<&str>) -> Result<(Vec<ReviewRecord>, Option<String>), ReviewError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(&self.config.reviews_endpoint)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| {
                ReviewError::upstream("review fetch failed")
                    .with_context("source", self.config.name.clone())
                    .with_source(err)
            })?;

        if !response.status().is_success() {
            return Err(ReviewError::upstream("review fetch rejected")
                .with_context("source", self.config.name.clone())
                .with_context("status", response.status().as_u16()));
        }

        let body: ReviewsResponse = response.json().await.map_err(|err| {
            ReviewError::upstream("review response malformed")
                .with_context("source", self.config.name.clone())
                .with_source(err)
        })?;

        let cursor_cutoff = cursor.and_then(|c| DateTime::parse_from_rfc3339(c).ok()).map(|d| d.with_timezone(&Utc));

        let mut newest: Option<DateTime<Utc>> = cursor_cutoff;
        let mut records = Vec::new();
        for remote in body.reviews {
            let review_date = remote.update_time.or(remote.create_time).unwrap_or_else(Utc::now);
            if let Some(cutoff) = cursor_cutoff {
                if review_date <= cutoff {
                    continue;
                }
            }
            if newest.is_none_or(|n| review_date > n) {
                newest = Some(review_date);
            }
            let raw = serde_json::to_value(&remote).unwrap_or(serde_json::Value::Null);
            records.push(self.map_review(remote, raw));
        }

        debug!(source = %self.config.name, count = records.len(), "fetched reviews");
        let new_cursor = newest.map(|d| d.to_rfc3339());
        Ok((records, new_cursor))
    }

    fn parse(&self, _raw: &serde_json::Value) -> Result<Vec<ReviewRecord>, ReviewError> {
        Err(ReviewError::bad_request("oauth business-profile adapter does not accept push ingress")
            .with_context("source", self.config.name.clone()))
    }
}
