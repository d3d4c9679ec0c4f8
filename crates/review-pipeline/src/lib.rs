// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fan-out pipeline (C6): deduplicate, persist, optionally render and
//! share, recording processing flags. `process` never aborts a batch —
//! a failure in one step is recorded under `errors[]` and the next
//! record still runs (`spec.md` §4.5).

#![deny(unsafe_code)]
#![warn(missing_docs)]

use chrono::Utc;
use review_core::config::ChatConfig;
use review_core::{OutputFormat, ProcessingFlags, RenderRequest, ReviewRecord, SizePreset};
use review_render::template::Branding;
use review_render::RenderCoordinator;
use review_store::Store;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// One failure recorded against a specific record and pipeline step.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineError {
    /// The record's id.
    pub id: String,
    /// Which step failed: `"generate"` or `"share"`.
    pub step: &'static str,
    /// Human-readable failure detail.
    pub message: String,
}

/// Aggregate result of a `process` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineSummary {
    /// Records newly persisted.
    pub new: u32,
    /// Records skipped as duplicates.
    pub duplicate: u32,
    /// Records for which an image was generated.
    pub generated: u32,
    /// Records shared to chat.
    pub shared: u32,
    /// Per-record failures, by step.
    pub errors: Vec<PipelineError>,
}

/// Static configuration the pipeline consults on every call.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Auto-render a branded image for every newly accepted review.
    pub auto_generate: bool,
    /// Auto-share rendered images to chat.
    pub auto_share: bool,
    /// Minimum rating required for auto-share.
    pub min_rating_for_auto_share: u8,
    /// Template used for auto-generated renders.
    pub default_template: String,
    /// Size preset used for auto-generated renders.
    pub default_size: SizePreset,
    /// Base URL used to resolve relative asset URLs in templates.
    pub base_url: String,
    /// Chat configuration, if chat sharing is enabled.
    pub chat: Option<ChatConfig>,
    /// Chat file-upload endpoint, required when `chat` is set.
    pub chat_upload_endpoint: Option<String>,
}

/// Ties the store, render coordinator, and chat share together into the
/// fan-out contract.
pub struct Pipeline {
    store: Store,
    render: Arc<RenderCoordinator>,
    http: reqwest::Client,
    config: PipelineConfig,
    branding: Branding,
}

impl Pipeline {
    /// Construct a pipeline over an already-open store and render
    /// coordinator.
    pub fn new(store: Store, render: Arc<RenderCoordinator>, http: reqwest::Client, config: PipelineConfig, branding: Branding) -> Self {
        Self {
            store,
            render,
            http,
            config,
            branding,
        }
    }

    fn default_render_request(&self, record: &ReviewRecord) -> RenderRequest {
        RenderRequest {
            reviewer_name: record.reviewer_name.clone(),
            rating: record.rating as i64,
            review_text: record.review_text.clone(),
            tech_name: record.tech_name.clone(),
            tech_photo_url: record.tech_photo_url.clone(),
            source: Some(record.source.clone()),
            template: self.config.default_template.clone(),
            size: self.config.default_size,
            format: OutputFormat::Png,
            brand_color: None,
            brand_color_dark: None,
            logo_url: None,
            callback_url: None,
        }
    }

    /// Run the fan-out contract over `records`, in order, never aborting
    /// on a per-record failure.
    pub async fn process(&self, records: Vec<ReviewRecord>) -> PipelineSummary {
        let mut summary = PipelineSummary::default();

        for record in records {
            if self.store.has(&record.id).await {
                summary.duplicate += 1;
                continue;
            }

            let id = record.id.clone();
            let rating = record.rating;
            if let Err(err) = self.store.add(record.clone()).await {
                warn!(id = %id, error = ?err, "record vanished between has() and add(), treating as duplicate");
                summary.duplicate += 1;
                continue;
            }
            summary.new += 1;

            let mut generated_image: Option<(Vec<u8>, OutputFormat)> = None;
            if self.config.auto_generate {
                let request = self.default_render_request(&record);
                match self.render.render(&request, &self.branding, &self.config.base_url).await {
                    Ok(image) => {
                        let now = Utc::now();
                        if let Err(err) = self.store.mark_processed(&id, ProcessingFlags::generated(now)).await {
                            warn!(id = %id, error = ?err, "failed to mark record as generated");
                        }
                        summary.generated += 1;
                        generated_image = Some((image.bytes, image.format));
                    }
                    Err(err) => {
                        summary.errors.push(PipelineError {
                            id: id.clone(),
                            step: "generate",
                            message: err.to_string(),
                        });
                    }
                }
            }

            let should_share = self.config.auto_share
                && generated_image.is_some()
                && rating >= self.config.min_rating_for_auto_share;

            if should_share {
                if let (Some((bytes, format)), Some(chat), Some(endpoint)) =
                    (generated_image, self.config.chat.as_ref(), self.config.chat_upload_endpoint.as_ref())
                {
                    match review_chat::share(&self.http, endpoint, chat, &record, bytes, format).await {
                        Ok(()) => {
                            let now = Utc::now();
                            if let Err(err) = self.store.mark_processed(&id, ProcessingFlags::shared(now)).await {
                                warn!(id = %id, error = ?err, "failed to mark record as shared");
                            }
                            summary.shared += 1;
                        }
                        Err(err) => {
                            summary.errors.push(PipelineError {
                                id: id.clone(),
                                step: "share",
                                message: err.to_string(),
                            });
                        }
                    }
                }
            }
        }

        summary
    }
}
