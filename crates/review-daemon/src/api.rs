// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP handlers (`spec.md` §6). Each handler validates, then delegates
//! to the component crates; nothing below this module is HTTP-aware.

use crate::state::{ApiError, AppState};
use crate::validation::{self, MAX_BATCH_SIZE};
use crate::webhook;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use review_core::render::OutputFormat;
use review_core::{ProcessingFlags, RenderRequest, ReviewRecord, SizePreset};
use review_error::{FieldError, ReviewError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Health / discovery
// ---------------------------------------------------------------------------

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "browser_connected": state.render.browser_connected().await,
    }))
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "company": state.config.company,
        "ingestion": {
            "enabled": state.config.ingestion.enabled,
            "auto_generate": state.config.ingestion.auto_generate,
            "auto_share": state.config.ingestion.auto_share,
            "default_template": state.config.ingestion.default_template,
            "default_size": state.config.ingestion.default_size,
        },
        "chat_configured": state.config.chat.is_some(),
    }))
}

pub async fn list_templates(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.render.template_names())
}

pub async fn list_sizes() -> Json<BTreeMap<String, (u32, u32)>> {
    Json(SizePreset::ALL.iter().map(|p| (p.to_string(), p.dimensions())).collect())
}

#[derive(Debug, Serialize)]
struct PlatformInfo {
    key: &'static str,
    label: &'static str,
    color: &'static str,
}

/// Platform badge metadata for the three platforms with dedicated chat
/// labels/render badges (`review-chat::platform_label`,
/// `review-render::template::PlatformBadges`); `spec.md` asks for colours
/// too, which neither of those carries, so brand colours are recorded here.
pub async fn list_platforms() -> Json<Vec<PlatformInfo>> {
    Json(vec![
        PlatformInfo { key: "google", label: "Google", color: "#4285f4" },
        PlatformInfo { key: "yelp", label: "Yelp", color: "#d32323" },
        PlatformInfo { key: "facebook", label: "Facebook", color: "#1877f2" },
    ])
}

// ---------------------------------------------------------------------------
// Technician photos
// ---------------------------------------------------------------------------

pub async fn list_technicians(State(state): State<Arc<AppState>>) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    let mut out = BTreeMap::new();
    let mut entries = tokio::fs::read_dir(&state.technicians_dir)
        .await
        .map_err(|err| ReviewError::internal("failed to list technician photos").with_source(err))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| ReviewError::internal("failed to read technician photo entry").with_source(err))?
    {
        if let Some(name) = entry.file_name().to_str() {
            out.insert(name.to_string(), technician_photo_url(&state, name));
        }
    }
    Ok(Json(out))
}

fn technician_photo_url(state: &AppState, filename: &str) -> String {
    format!("{}/api/technicians/files/{}", state.base_url.trim_end_matches('/'), filename)
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    name: String,
}

pub async fn upload_technician_photo(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.len() > validation::MAX_UPLOAD_BODY_BYTES {
        return Err(ReviewError::bad_request("upload exceeds the 5 MB limit").into());
    }
    if !validation::is_safe_filename_stem(&query.name) {
        return Err(ReviewError::bad_request("invalid name")
            .with_details(vec![FieldError::new("name", "must be alphanumeric, dash, or underscore")])
            .into());
    }

    let extension = match headers.get(axum::http::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        Some("image/png") => "png",
        Some("image/jpeg") | Some("image/jpg") => "jpg",
        _ => {
            return Err(ReviewError::bad_request("unsupported content type, expected image/png or image/jpeg").into());
        }
    };

    let filename = format!("{}.{extension}", query.name);
    let path = state.technicians_dir.join(&filename);
    tokio::fs::write(&path, &body)
        .await
        .map_err(|err| ReviewError::internal("failed to store technician photo").with_source(err))?;

    Ok(Json(serde_json::json!({ "url": technician_photo_url(&state, &filename) })))
}

// ---------------------------------------------------------------------------
// Render
// ---------------------------------------------------------------------------

pub async fn generate_post(State(state): State<Arc<AppState>>, Json(request): Json<RenderRequest>) -> Result<Response, ApiError> {
    render_handler(state, request).await
}

pub async fn generate_get(State(state): State<Arc<AppState>>, Query(request): Query<RenderRequest>) -> Result<Response, ApiError> {
    render_handler(state, request).await
}

async fn render_handler(state: Arc<AppState>, request: RenderRequest) -> Result<Response, ApiError> {
    if request.callback_url.is_some() {
        let render = state.render.clone();
        let branding = state.branding.clone();
        let base_url = state.base_url.clone();
        let http = state.http.clone();
        tokio::spawn(render.render_callback(request, branding, base_url, http));
        return Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "accepted": true }))).into_response());
    }

    let start = std::time::Instant::now();
    let image = state.render.render(&request, &state.branding, &state.base_url).await?;
    let elapsed_ms = start.elapsed().as_millis();

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(axum::http::header::CONTENT_TYPE, image.format.content_type())
        .header("x-image-width", image.width.to_string())
        .header("x-image-height", image.height.to_string())
        .header("x-generation-time-ms", elapsed_ms.to_string())
        .body(axum::body::Body::from(image.bytes))
        .expect("response with known-valid header values always builds");

    if image.cache_hit {
        response.headers_mut().insert("x-cache", "HIT".parse().unwrap());
    }
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    reviews: Vec<RenderRequest>,
}

#[derive(Debug, Serialize)]
struct BatchItemResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    image_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<OutputFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn generate_batch(State(state): State<Arc<AppState>>, Json(body): Json<BatchRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    if body.reviews.is_empty() {
        return Err(ReviewError::bad_request("batch must not be empty").into());
    }
    if body.reviews.len() > MAX_BATCH_SIZE {
        return Err(ReviewError::bad_request(format!("batch exceeds the maximum of {MAX_BATCH_SIZE} items")).into());
    }

    let rendered = state.render.render_batch(&body.reviews, &state.branding, &state.base_url).await;
    let results: Vec<BatchItemResult> = rendered
        .into_iter()
        .map(|result| match result {
            Ok(image) => BatchItemResult {
                image_base64: Some(BASE64.encode(&image.bytes)),
                format: Some(image.format),
                width: Some(image.width),
                height: Some(image.height),
                error: None,
            },
            Err(err) => BatchItemResult { image_base64: None, format: None, width: None, height: None, error: Some(err.message) },
        })
        .collect();

    Ok(Json(serde_json::json!({ "results": results })))
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

pub async fn chat_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match &state.config.chat {
        Some(chat) => Json(serde_json::json!({ "configured": true, "channel": chat.channel })),
        None => Json(serde_json::json!({ "configured": false, "channel": null })),
    }
}

fn synthetic_record(request: &RenderRequest) -> ReviewRecord {
    ReviewRecord {
        id: "adhoc".into(),
        source: request.source.clone().unwrap_or_else(|| "generic".into()),
        reviewer_name: request.reviewer_name.clone(),
        rating: request.clamped_stars(),
        review_text: request.review_text.clone(),
        review_date: Utc::now(),
        tech_name: request.tech_name.clone(),
        tech_photo_url: request.tech_photo_url.clone(),
        raw: serde_json::Value::Null,
        processed_at: None,
        image_generated: false,
        chat_shared: false,
        partial: false,
    }
}

pub async fn share_chat(State(state): State<Arc<AppState>>, Json(request): Json<RenderRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    let chat = state
        .config
        .chat
        .as_ref()
        .ok_or_else(|| ReviewError::bad_request("chat is not configured"))?;
    let endpoint = state
        .chat_upload_endpoint
        .as_ref()
        .ok_or_else(|| ReviewError::bad_request("chat upload endpoint is not configured"))?;

    let image = state.render.render(&request, &state.branding, &state.base_url).await?;
    let record = synthetic_record(&request);
    review_chat::share(&state.http, endpoint, chat, &record, image.bytes, image.format).await?;
    Ok(Json(serde_json::json!({ "shared": true })))
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

pub async fn ingestion_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "stats": state.store.stats().await,
        "adapters": state.scheduler.status(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_recent_limit")]
    limit: usize,
    source: Option<String>,
}

fn default_recent_limit() -> usize {
    review_store::MAX_RECENT_LIMIT
}

pub async fn list_reviews(State(state): State<Arc<AppState>>, Query(query): Query<RecentQuery>) -> Json<Vec<ReviewRecord>> {
    Json(state.store.recent(query.limit, query.source.as_deref()).await)
}

pub async fn get_review(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<ReviewRecord>, ApiError> {
    state
        .store
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| ReviewError::not_found("unknown review id").with_context("id", id).into())
}

pub async fn poll_all(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, serde_json::Value>> {
    let results = state.scheduler.poll_all().await;
    let mapped = results
        .into_iter()
        .map(|(source, outcome)| {
            let value = match outcome {
                Ok(outcome) => serde_json::to_value(outcome).unwrap_or(serde_json::Value::Null),
                Err(err) => serde_json::json!({ "error": err.message }),
            };
            (source, value)
        })
        .collect();
    Json(mapped)
}

pub async fn poll_one(State(state): State<Arc<AppState>>, Path(source): Path<String>) -> Result<Json<review_scheduler::PollOutcome>, ApiError> {
    let outcome = state.scheduler.poll_once(&source).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct WebhookVerificationQuery {
    verification: Option<String>,
}

pub async fn webhook_verify(Query(query): Query<WebhookVerificationQuery>) -> String {
    query.verification.unwrap_or_default()
}

pub async fn webhook_ingest(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<review_pipeline::PipelineSummary>, ApiError> {
    if body.len() > validation::MAX_JSON_BODY_BYTES {
        return Err(ReviewError::bad_request("request body exceeds the 1 MB limit").into());
    }

    let adapter = state
        .adapter(&source)
        .ok_or_else(|| ReviewError::not_found("unknown adapter").with_context("source", source.clone()))?
        .clone();

    if let Some(secret) = state.config.ingestion.sources.get(&source).and_then(|c| c.webhook_secret.as_deref()) {
        if !webhook::verify(secret, &body, &headers) {
            return Err(ReviewError::unauthorized("invalid webhook signature").into());
        }
    }

    let raw: serde_json::Value =
        serde_json::from_slice(&body).map_err(|err| ReviewError::bad_request("invalid JSON body").with_source(err))?;
    let records = adapter.parse(&raw)?;
    let summary = state.pipeline.process(records).await;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
struct CsvImportRow {
    reviewer_name: String,
    rating: i64,
    review_text: String,
    #[serde(default)]
    review_date: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    tech_name: Option<String>,
    #[serde(default)]
    tech_photo_url: Option<String>,
}

impl CsvImportRow {
    fn into_record(self) -> ReviewRecord {
        let source = self.source.unwrap_or_else(|| "import".to_string());
        let rating = review_core::record::clamp_rating_for_storage(self.rating);
        let reviewer_name = review_core::record::truncate_chars(&self.reviewer_name, review_core::record::MAX_REVIEWER_NAME_LEN);
        let review_text = review_core::record::truncate_chars(&self.review_text, review_core::record::MAX_REVIEW_TEXT_LEN);
        let review_date = self
            .review_date
            .as_deref()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        let id = review_core::Identity::derive(&source, None, &reviewer_name, &review_text, rating);
        ReviewRecord {
            id,
            source,
            reviewer_name,
            rating,
            review_text,
            review_date,
            tech_name: self.tech_name,
            tech_photo_url: self.tech_photo_url,
            raw: serde_json::Value::Null,
            processed_at: None,
            image_generated: false,
            chat_shared: false,
            partial: false,
        }
    }
}

fn parse_csv_import(body: &[u8]) -> Result<Vec<ReviewRecord>, ReviewError> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(body);
    let mut records = Vec::new();
    for result in reader.deserialize::<CsvImportRow>() {
        let row = result.map_err(|err| ReviewError::bad_request("invalid CSV row").with_source(err))?;
        records.push(row.into_record());
    }
    Ok(records)
}

pub async fn ingestion_import(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Result<Json<review_pipeline::PipelineSummary>, ApiError> {
    if body.len() > validation::MAX_UPLOAD_BODY_BYTES {
        return Err(ReviewError::bad_request("import body exceeds the 5 MB limit").into());
    }

    let content_type = headers.get(axum::http::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("");
    let records = if content_type.contains("csv") {
        parse_csv_import(&body)?
    } else {
        let raw: serde_json::Value =
            serde_json::from_slice(&body).map_err(|err| ReviewError::bad_request("invalid JSON body").with_source(err))?;
        let adapter = state.adapter("generic").expect("the generic adapter is always registered");
        adapter.parse(&raw)?
    };

    let summary = state.pipeline.process(records).await;
    Ok(Json(summary))
}

fn default_render_request(record: &ReviewRecord, template: &str, size: SizePreset) -> RenderRequest {
    RenderRequest {
        reviewer_name: record.reviewer_name.clone(),
        rating: record.rating as i64,
        review_text: record.review_text.clone(),
        tech_name: record.tech_name.clone(),
        tech_photo_url: record.tech_photo_url.clone(),
        source: Some(record.source.clone()),
        template: template.to_string(),
        size,
        format: OutputFormat::Png,
        brand_color: None,
        brand_color_dark: None,
        logo_url: None,
        callback_url: None,
    }
}

pub async fn generate_stored_review(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state
        .store
        .get(&id)
        .await
        .ok_or_else(|| ReviewError::not_found("unknown review id").with_context("id", id.clone()))?;

    let request = default_render_request(&record, &state.default_template, state.default_size);
    let image = state.render.render(&request, &state.branding, &state.base_url).await?;
    state.store.mark_processed(&id, ProcessingFlags::generated(Utc::now())).await?;

    Ok(Json(serde_json::json!({
        "image_base64": BASE64.encode(&image.bytes),
        "format": image.format,
        "width": image.width,
        "height": image.height,
    })))
}

pub async fn share_stored_review(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    let chat = state
        .config
        .chat
        .as_ref()
        .ok_or_else(|| ReviewError::bad_request("chat is not configured"))?;
    let endpoint = state
        .chat_upload_endpoint
        .as_ref()
        .ok_or_else(|| ReviewError::bad_request("chat upload endpoint is not configured"))?;
    let record = state
        .store
        .get(&id)
        .await
        .ok_or_else(|| ReviewError::not_found("unknown review id").with_context("id", id.clone()))?;

    let request = default_render_request(&record, &state.default_template, state.default_size);
    let image = state.render.render(&request, &state.branding, &state.base_url).await?;
    review_chat::share(&state.http, endpoint, chat, &record, image.bytes, image.format).await?;

    let now = Utc::now();
    state.store.mark_processed(&id, ProcessingFlags::generated(now)).await.ok();
    state.store.mark_processed(&id, ProcessingFlags::shared(now)).await?;

    Ok(Json(serde_json::json!({ "shared": true })))
}

#[derive(Debug, Deserialize, Default)]
struct PruneRequest {
    max_age_days: Option<i64>,
}

const DEFAULT_PRUNE_MAX_AGE_DAYS: i64 = 90;

pub async fn prune_reviews(State(state): State<Arc<AppState>>, body: Bytes) -> Json<serde_json::Value> {
    let max_age_days = if body.is_empty() {
        DEFAULT_PRUNE_MAX_AGE_DAYS
    } else {
        serde_json::from_slice::<PruneRequest>(&body)
            .ok()
            .and_then(|req| req.max_age_days)
            .unwrap_or(DEFAULT_PRUNE_MAX_AGE_DAYS)
    };
    let removed = state.store.prune(max_age_days).await;
    Json(serde_json::json!({ "removed": removed }))
}
