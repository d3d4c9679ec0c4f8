// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP surface and shared application wiring for the review image
//! service (`spec.md` §6).

#![deny(unsafe_code)]

pub mod adapters;
pub mod api;
pub mod config_loader;
pub mod middleware;
pub mod state;
pub mod validation;
pub mod webhook;

use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;

/// Build the full Axum router: discovery, render, chat, and ingestion
/// routes, technician photo static serving, and the shared middleware
/// stack (request id, access log, CORS, per-route body size caps).
pub fn build_app(state: Arc<AppState>) -> Router {
    let default_routes = Router::new()
        .route("/health", get(api::health))
        .route("/api/config", get(api::get_config))
        .route("/api/templates", get(api::list_templates))
        .route("/api/sizes", get(api::list_sizes))
        .route("/api/platforms", get(api::list_platforms))
        .route("/api/technicians", get(api::list_technicians))
        .route("/generate", get(api::generate_get).post(api::generate_post))
        .route("/generate/batch", post(api::generate_batch))
        .route("/api/chat/status", get(api::chat_status))
        .route("/api/share/chat", post(api::share_chat))
        .route("/api/ingestion/status", get(api::ingestion_status))
        .route("/api/ingestion/reviews", get(api::list_reviews))
        .route("/api/ingestion/reviews/{id}", get(api::get_review))
        .route("/api/ingestion/reviews/{id}/generate", post(api::generate_stored_review))
        .route("/api/ingestion/reviews/{id}/share", post(api::share_stored_review))
        .route("/api/ingestion/poll", post(api::poll_all))
        .route("/api/ingestion/poll/{source}", post(api::poll_one))
        .route("/api/ingestion/webhook/{source}", get(api::webhook_verify).post(api::webhook_ingest))
        .route("/api/ingestion/prune", post(api::prune_reviews))
        .layer(RequestBodyLimitLayer::new(validation::MAX_JSON_BODY_BYTES));

    let upload_routes = Router::new()
        .route("/api/technicians/upload", post(api::upload_technician_photo))
        .route("/api/ingestion/import", post(api::ingestion_import))
        .layer(RequestBodyLimitLayer::new(validation::MAX_UPLOAD_BODY_BYTES));

    let files = Router::new().nest_service("/api/technicians/files", ServeDir::new(&state.technicians_dir));

    Router::new()
        .merge(default_routes)
        .merge(upload_routes)
        .merge(files)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(axum::middleware::from_fn(middleware::RequestLogger::layer))
        .layer(middleware::permissive_cors())
        .with_state(state)
}
