// SPDX-License-Identifier: MIT OR Apache-2.0
//! Builds concrete [`SourceAdapter`] instances from the opaque
//! `ingestion.sources` configuration map (`spec.md` §4.2, §6).
//!
//! `SourceConfig::extra` is opaque to `review-core` by design; this is
//! the one place that gives it meaning, reading a `kind` tag to decide
//! which adapter constructor applies and pulling that adapter's
//! required fields out of the same map.

use review_core::config::{IngestionConfig, SourceConfig};
use review_sources::api_key_feed::ApiKeyFeedConfig;
use review_sources::oauth_business_profile::OAuthBusinessProfileConfig;
use review_sources::partner_offset::PartnerOffsetConfig;
use review_sources::{ApiKeyFeedAdapter, GenericAdapter, OAuthBusinessProfileAdapter, PartnerOffsetAdapter, SourceAdapter};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Adapters built from configuration, split by how they're used.
pub struct BuiltAdapters {
    /// Adapters the scheduler should poll, with their per-source interval
    /// override.
    pub pollable: Vec<(Arc<dyn SourceAdapter>, Option<u64>)>,
    /// Every configured adapter (plus `"generic"`), keyed by source name,
    /// for webhook/import handlers to look up by path parameter.
    pub by_name: BTreeMap<String, Arc<dyn SourceAdapter>>,
}

/// Build every adapter named in `ingestion.sources`, plus the always-present
/// `"generic"` adapter used for webhook/import ingress from unrecognised
/// platforms.
pub fn build_adapters(ingestion: &IngestionConfig, http: reqwest::Client) -> BuiltAdapters {
    let mut pollable = Vec::new();
    let mut by_name = BTreeMap::new();

    let generic: Arc<dyn SourceAdapter> = Arc::new(GenericAdapter::new("generic", ingestion.generic.field_mapping.clone()));
    by_name.insert("generic".to_string(), generic);

    for (name, source) in &ingestion.sources {
        if !source.enabled {
            continue;
        }
        let kind = source.extra.get("kind").and_then(|v| v.as_str()).unwrap_or("generic");
        match kind {
            "oauth_business_profile" => {
                if let Some(adapter) = build_oauth(name, source, http.clone()) {
                    pollable.push((adapter.clone(), source.poll_interval_minutes));
                    by_name.insert(name.clone(), adapter);
                }
            }
            "api_key_feed" => {
                if let Some(adapter) = build_api_key_feed(name, source, http.clone()) {
                    pollable.push((adapter.clone(), source.poll_interval_minutes));
                    by_name.insert(name.clone(), adapter);
                }
            }
            "partner_offset" => {
                if let Some(adapter) = build_partner_offset(name, source, http.clone()) {
                    pollable.push((adapter.clone(), source.poll_interval_minutes));
                    by_name.insert(name.clone(), adapter);
                }
            }
            "generic" => {
                let adapter: Arc<dyn SourceAdapter> =
                    Arc::new(GenericAdapter::new(name.clone(), ingestion.generic.field_mapping.clone()));
                by_name.insert(name.clone(), adapter);
            }
            other => {
                warn!(source = name, kind = other, "unknown adapter kind, skipping");
            }
        }
    }

    BuiltAdapters { pollable, by_name }
}

fn extra_str(source: &SourceConfig, key: &str) -> Option<String> {
    source.extra.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn build_oauth(name: &str, source: &SourceConfig, http: reqwest::Client) -> Option<Arc<dyn SourceAdapter>> {
    let fields = (
        extra_str(source, "token_endpoint"),
        extra_str(source, "client_id"),
        extra_str(source, "client_secret"),
        extra_str(source, "refresh_token"),
        extra_str(source, "reviews_endpoint"),
    );
    match fields {
        (Some(token_endpoint), Some(client_id), Some(client_secret), Some(refresh_token), Some(reviews_endpoint)) => {
            Some(Arc::new(OAuthBusinessProfileAdapter::new(
                OAuthBusinessProfileConfig {
                    name: name.to_string(),
                    token_endpoint,
                    client_id,
                    client_secret,
                    refresh_token,
                    reviews_endpoint,
                },
                http,
            )))
        }
        _ => {
            warn!(source = name, "oauth_business_profile source missing required fields, skipping");
            None
        }
    }
}

fn build_api_key_feed(name: &str, source: &SourceConfig, http: reqwest::Client) -> Option<Arc<dyn SourceAdapter>> {
    let fields = (extra_str(source, "api_key"), extra_str(source, "feed_endpoint"));
    match fields {
        (Some(api_key), Some(feed_endpoint)) => Some(Arc::new(ApiKeyFeedAdapter::new(
            ApiKeyFeedConfig { name: name.to_string(), api_key, feed_endpoint },
            http,
        ))),
        _ => {
            warn!(source = name, "api_key_feed source missing required fields, skipping");
            None
        }
    }
}

fn build_partner_offset(name: &str, source: &SourceConfig, http: reqwest::Client) -> Option<Arc<dyn SourceAdapter>> {
    let fields = (extra_str(source, "bearer_token"), extra_str(source, "endpoint"));
    match fields {
        (Some(bearer_token), Some(endpoint)) => Some(Arc::new(PartnerOffsetAdapter::new(
            PartnerOffsetConfig { name: name.to_string(), bearer_token, endpoint },
            http,
        ))),
        _ => {
            warn!(source = name, "partner_offset source missing required fields, skipping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    fn source(kind: &str, extra: &[(&str, serde_json::Value)]) -> SourceConfig {
        let mut fields: Map<String, serde_json::Value> = extra.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        fields.insert("kind".to_string(), serde_json::json!(kind));
        SourceConfig { enabled: true, poll_interval_minutes: None, webhook_secret: None, extra: fields }
    }

    #[test]
    fn builds_pollable_adapter_for_complete_oauth_source() {
        let mut ingestion = IngestionConfig {
            enabled: true,
            auto_generate: false,
            auto_share: false,
            min_rating_for_auto_share: 4,
            default_template: "default".into(),
            default_size: "square".into(),
            poll_interval_minutes: 15,
            data_path: "./reviews.json".into(),
            sources: Map::new(),
            generic: Default::default(),
        };
        ingestion.sources.insert(
            "google".to_string(),
            source(
                "oauth_business_profile",
                &[
                    ("token_endpoint", serde_json::json!("https://example.com/token")),
                    ("client_id", serde_json::json!("id")),
                    ("client_secret", serde_json::json!("secret")),
                    ("refresh_token", serde_json::json!("refresh")),
                    ("reviews_endpoint", serde_json::json!("https://example.com/reviews")),
                ],
            ),
        );

        let built = build_adapters(&ingestion, reqwest::Client::new());
        assert_eq!(built.pollable.len(), 1);
        assert!(built.by_name.contains_key("google"));
        assert!(built.by_name.contains_key("generic"));
    }

    #[test]
    fn skips_source_missing_required_fields() {
        let mut ingestion = IngestionConfig {
            enabled: true,
            auto_generate: false,
            auto_share: false,
            min_rating_for_auto_share: 4,
            default_template: "default".into(),
            default_size: "square".into(),
            poll_interval_minutes: 15,
            data_path: "./reviews.json".into(),
            sources: Map::new(),
            generic: Default::default(),
        };
        ingestion.sources.insert("broken".to_string(), source("api_key_feed", &[]));

        let built = build_adapters(&ingestion, reqwest::Client::new());
        assert!(built.pollable.is_empty());
        assert!(!built.by_name.contains_key("broken"));
    }

    #[test]
    fn disabled_source_is_never_built() {
        let mut ingestion = IngestionConfig {
            enabled: true,
            auto_generate: false,
            auto_share: false,
            min_rating_for_auto_share: 4,
            default_template: "default".into(),
            default_size: "square".into(),
            poll_interval_minutes: 15,
            data_path: "./reviews.json".into(),
            sources: Map::new(),
            generic: Default::default(),
        };
        let mut disabled = source("generic", &[]);
        disabled.enabled = false;
        ingestion.sources.insert("off".to_string(), disabled);

        let built = build_adapters(&ingestion, reqwest::Client::new());
        assert!(!built.by_name.contains_key("off"));
    }
}
