// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared application state and the HTTP error wrapper.

use axum::response::{IntoResponse, Response};
use axum::Json;
use axum::http::StatusCode;
use review_core::config::AppConfig;
use review_error::{ErrorBody, ReviewError};
use review_pipeline::Pipeline;
use review_core::SizePreset;
use review_render::template::Branding;
use review_render::RenderCoordinator;
use review_scheduler::Scheduler;
use review_store::Store;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Everything an HTTP handler needs, shared behind a single `Arc`.
pub struct AppState {
    /// The loaded configuration document.
    pub config: AppConfig,
    /// Base URL used to resolve relative asset URLs in templates.
    pub base_url: String,
    /// Chat file-upload endpoint, if configured via the environment.
    pub chat_upload_endpoint: Option<String>,
    /// Branding fields pulled out of `config.company` for template fills.
    pub branding: Branding,
    /// Persistent review store.
    pub store: Store,
    /// Render coordinator (browser lease, templates, cache).
    pub render: Arc<RenderCoordinator>,
    /// Poll scheduler, covering every pollable adapter.
    pub scheduler: Arc<Scheduler>,
    /// Fan-out pipeline, shared with the scheduler.
    pub pipeline: Arc<Pipeline>,
    /// Template used for single-review `/generate` and `/share` calls.
    pub default_template: String,
    /// Size preset used for single-review `/generate` and `/share` calls.
    pub default_size: SizePreset,
    /// Every configured adapter, including the catch-all `"generic"`, for
    /// webhook/import dispatch.
    pub adapters_by_name: BTreeMap<String, Arc<dyn review_sources::SourceAdapter>>,
    /// Outbound HTTP client, shared across adapters/chat/callbacks.
    pub http: reqwest::Client,
    /// Directory uploaded technician photos are stored under.
    pub technicians_dir: PathBuf,
    /// Process start time, for `/health`'s `uptime_seconds`.
    pub started_at: Instant,
}

impl AppState {
    /// True if an adapter's `source` name resolves to a registered adapter.
    pub fn adapter(&self, source: &str) -> Option<&Arc<dyn review_sources::SourceAdapter>> {
        self.adapters_by_name.get(source)
    }
}

/// Wraps [`ReviewError`] as an Axum [`IntoResponse`], mapping its kind to
/// the conventional status code and its fields to `{error, details?}`
/// (`spec.md` §7).
pub struct ApiError(pub ReviewError);

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = (&self.0).into();
        (status, Json(body)).into_response()
    }
}
