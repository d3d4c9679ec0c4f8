// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end HTTP tests for the review image service, driven through
//! `build_app` with `tower::ServiceExt::oneshot` (no real socket).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use review_core::config::{AppConfig, CompanyConfig, IngestionConfig};
use review_core::SizePreset;
use review_daemon::state::AppState;
use review_daemon::{build_app, validation};
use review_render::browser::MockBrowser;
use review_render::template::Branding;
use review_render::RenderCoordinator;
use review_pipeline::{Pipeline, PipelineConfig};
use review_scheduler::Scheduler;
use review_store::Store;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceExt;

fn test_config() -> AppConfig {
    AppConfig {
        company: CompanyConfig {
            name: "Acme HVAC".into(),
            phone: "555-0100".into(),
            brand_color: "#1a73e8".into(),
            brand_color_dark: "#0b4fa0".into(),
            logo_url: "/logo.png".into(),
        },
        chat: None,
        ingestion: IngestionConfig {
            enabled: false,
            auto_generate: false,
            auto_share: false,
            min_rating_for_auto_share: 4,
            default_template: "default".into(),
            default_size: "square".into(),
            poll_interval_minutes: 15,
            data_path: "unused".into(),
            sources: BTreeMap::new(),
            generic: Default::default(),
        },
    }
}

async fn test_state(store_path: &std::path::Path, technicians_dir: &std::path::Path) -> Arc<AppState> {
    let config = test_config();
    let http = reqwest::Client::new();
    let store = Store::open(store_path).await.unwrap();
    let render = Arc::new(RenderCoordinator::new(Arc::new(MockBrowser::new())));
    let branding = Branding {
        company_name: config.company.name.clone(),
        company_phone: config.company.phone.clone(),
        logo_url: config.company.logo_url.clone(),
        brand_color: config.company.brand_color.clone(),
        brand_color_dark: config.company.brand_color_dark.clone(),
    };
    let default_size = SizePreset::parse(&config.ingestion.default_size).unwrap();
    let default_template = config.ingestion.default_template.clone();

    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        render.clone(),
        http.clone(),
        PipelineConfig {
            auto_generate: config.ingestion.auto_generate,
            auto_share: config.ingestion.auto_share,
            min_rating_for_auto_share: config.ingestion.min_rating_for_auto_share,
            default_template: default_template.clone(),
            default_size,
            base_url: "https://example.com".into(),
            chat: config.chat.clone(),
            chat_upload_endpoint: None,
        },
        branding.clone(),
    ));
    let scheduler = Arc::new(Scheduler::new(Vec::new(), store.clone(), pipeline.clone(), config.ingestion.poll_interval_minutes));

    tokio::fs::create_dir_all(technicians_dir).await.unwrap();

    Arc::new(AppState {
        config,
        base_url: "https://example.com".into(),
        chat_upload_endpoint: None,
        branding,
        store,
        render,
        scheduler,
        pipeline,
        default_template,
        default_size,
        adapters_by_name: review_daemon::adapters::build_adapters(&test_config().ingestion, reqwest::Client::new()).by_name,
        http,
        technicians_dir: technicians_dir.to_path_buf(),
        started_at: Instant::now(),
    })
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let resp = app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() { serde_json::Value::Null } else { serde_json::from_slice(&body).unwrap() };
    (status, json)
}

#[tokio::test]
async fn health_reports_ok_and_uptime() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let (status, json) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json.get("uptime_seconds").is_some());
}

#[tokio::test]
async fn config_echoes_company_and_ingestion_block() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let (status, json) = get_json(app, "/api/config").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["company"]["name"], "Acme HVAC");
    assert_eq!(json["chat_configured"], false);
}

#[tokio::test]
async fn sizes_lists_every_preset() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let (status, json) = get_json(app, "/api/sizes").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_object().unwrap().len(), SizePreset::ALL.len());
}

#[tokio::test]
async fn platforms_lists_three_badges_with_colors() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let (status, json) = get_json(app, "/api/platforms").await;

    assert_eq!(status, StatusCode::OK);
    let platforms = json.as_array().unwrap();
    assert_eq!(platforms.len(), 3);
    assert!(platforms.iter().any(|p| p["key"] == "google" && p["color"] == "#4285f4"));
}

fn sample_render_body() -> serde_json::Value {
    serde_json::json!({
        "reviewer_name": "Jane D.",
        "rating": 5,
        "review_text": "Excellent work, on time and tidy.",
    })
}

#[tokio::test]
async fn generate_post_returns_image_bytes_with_dimension_headers() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate")
                .header("content-type", "application/json")
                .body(Body::from(sample_render_body().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("x-image-width").is_some());
    assert!(resp.headers().get("x-image-height").is_some());
    assert_eq!(resp.headers().get("content-type").unwrap(), "image/png");

    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[0..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
}

#[tokio::test]
async fn generate_with_callback_url_returns_202_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let mut body = sample_render_body();
    body["callback_url"] = serde_json::json!("https://example.com/hook");

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn generate_unknown_template_surfaces_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let mut body = sample_render_body();
    body["template"] = serde_json::json!("nonexistent");

    let (status, json) = {
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/generate")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice::<serde_json::Value>(&bytes).unwrap())
    };

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn generate_batch_rejects_empty_list() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate/batch")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::json!({ "reviews": [] }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generate_batch_rejects_over_max_size() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let reviews: Vec<serde_json::Value> = (0..(validation::MAX_BATCH_SIZE + 1)).map(|_| sample_render_body()).collect();
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate/batch")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::json!({ "reviews": reviews }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generate_batch_returns_base64_images_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let mut first = sample_render_body();
    first["reviewer_name"] = serde_json::json!("First");
    let mut second = sample_render_body();
    second["reviewer_name"] = serde_json::json!("Second");

    let (status, json) = {
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/generate/batch")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::json!({ "reviews": [first, second] }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice::<serde_json::Value>(&bytes).unwrap())
    };

    assert_eq!(status, StatusCode::OK);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].get("image_base64").is_some());
    assert!(results[1].get("image_base64").is_some());
}

#[tokio::test]
async fn chat_status_reports_unconfigured_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let (status, json) = get_json(app, "/api/chat/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["configured"], false);
}

#[tokio::test]
async fn share_chat_without_configuration_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/share/chat")
                .header("content-type", "application/json")
                .body(Body::from(sample_render_body().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ingestion_status_reports_empty_store_and_no_adapters() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let (status, json) = get_json(app, "/api/ingestion/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stats"]["total"], 0);
    assert!(json["adapters"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_review_id_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let (status, json) = get_json(app, "/api/ingestion/reviews/generic:missing").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn webhook_ingest_valid_signature_persists_record() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    let mut source = review_core::config::SourceConfig {
        enabled: true,
        poll_interval_minutes: None,
        webhook_secret: Some("s3cr3t".into()),
        extra: BTreeMap::new(),
    };
    source.extra.insert("kind".into(), serde_json::json!("generic"));
    config.ingestion.sources.insert("manual".into(), source);

    let state = build_state_from_config(config, &dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let body = serde_json::json!([
        { "reviewer_name": "Sam", "rating": 5, "review_text": "Fantastic service" }
    ])
    .to_string();
    let mac_hex = {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;
        let mut mac = Hmac::<Sha256>::new_from_slice(b"s3cr3t").unwrap();
        mac.update(body.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    };

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/ingestion/webhook/manual")
                .header("content-type", "application/json")
                .header("x-hub-signature-256", format!("sha256={mac_hex}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let summary: review_pipeline::PipelineSummary = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(summary.new, 1);
}

#[tokio::test]
async fn webhook_ingest_rejects_bad_signature() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    let mut source = review_core::config::SourceConfig {
        enabled: true,
        poll_interval_minutes: None,
        webhook_secret: Some("s3cr3t".into()),
        extra: BTreeMap::new(),
    };
    source.extra.insert("kind".into(), serde_json::json!("generic"));
    config.ingestion.sources.insert("manual".into(), source);

    let state = build_state_from_config(config, &dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/ingestion/webhook/manual")
                .header("content-type", "application/json")
                .header("x-hub-signature-256", "sha256=deadbeef")
                .body(Body::from(serde_json::json!({ "reviewer_name": "Sam", "rating": 5, "review_text": "x" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn webhook_ingest_unknown_adapter_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/ingestion/webhook/nonexistent")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn webhook_verify_handshake_echoes_challenge() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/ingestion/webhook/generic?verification=abc123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"abc123");
}

#[tokio::test]
async fn csv_import_persists_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let csv = "reviewer_name,rating,review_text,review_date,source,tech_name,tech_photo_url\n\
               Jane,5,Great job,,import,Alex,\n\
               Sam,4,Pretty good,,import,,\n";

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/ingestion/import")
                .header("content-type", "text/csv")
                .body(Body::from(csv))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let summary: review_pipeline::PipelineSummary = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(summary.new, 2);
}

#[tokio::test]
async fn prune_defaults_to_90_days() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let resp = app
        .oneshot(Request::builder().method("POST").uri("/api/ingestion/prune").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["removed"], 0);
}

#[tokio::test]
async fn upload_rejects_unsupported_content_type() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/technicians/upload?name=alex-rivera")
                .header("content-type", "text/plain")
                .body(Body::from("not an image"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_rejects_unsafe_name() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/technicians/upload?name=..%2Fetc%2Fpasswd")
                .header("content-type", "image/png")
                .body(Body::from(vec![0x89, b'P', b'N', b'G']))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_then_list_technicians_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir.path().join("reviews.json"), &dir.path().join("technicians")).await;
    let app = build_app(state);

    let upload = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/technicians/upload?name=alex-rivera")
                .header("content-type", "image/png")
                .body(Body::from(vec![0x89, b'P', b'N', b'G']))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(upload.status(), StatusCode::OK);

    let (status, json) = get_json(app, "/api/technicians").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.as_object().unwrap().contains_key("alex-rivera.png"));
}

async fn build_state_from_config(config: AppConfig, store_path: &std::path::Path, technicians_dir: &std::path::Path) -> Arc<AppState> {
    let http = reqwest::Client::new();
    let store = Store::open(store_path).await.unwrap();
    let render = Arc::new(RenderCoordinator::new(Arc::new(MockBrowser::new())));
    let branding = Branding {
        company_name: config.company.name.clone(),
        company_phone: config.company.phone.clone(),
        logo_url: config.company.logo_url.clone(),
        brand_color: config.company.brand_color.clone(),
        brand_color_dark: config.company.brand_color_dark.clone(),
    };
    let default_size = SizePreset::parse(&config.ingestion.default_size).unwrap();
    let default_template = config.ingestion.default_template.clone();
    let built = review_daemon::adapters::build_adapters(&config.ingestion, http.clone());

    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        render.clone(),
        http.clone(),
        PipelineConfig {
            auto_generate: config.ingestion.auto_generate,
            auto_share: config.ingestion.auto_share,
            min_rating_for_auto_share: config.ingestion.min_rating_for_auto_share,
            default_template: default_template.clone(),
            default_size,
            base_url: "https://example.com".into(),
            chat: config.chat.clone(),
            chat_upload_endpoint: None,
        },
        branding.clone(),
    ));
    let scheduler = Arc::new(Scheduler::new(built.pollable, store.clone(), pipeline.clone(), config.ingestion.poll_interval_minutes));

    tokio::fs::create_dir_all(technicians_dir).await.unwrap();

    Arc::new(AppState {
        config,
        base_url: "https://example.com".into(),
        chat_upload_endpoint: None,
        branding,
        store,
        render,
        scheduler,
        pipeline,
        default_template,
        default_size,
        adapters_by_name: built.by_name,
        http,
        technicians_dir: technicians_dir.to_path_buf(),
        started_at: Instant::now(),
    })
}
