// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use review_core::SizePreset;
use review_daemon::adapters::build_adapters;
use review_daemon::config_loader::{self, RuntimeSettings};
use review_daemon::state::AppState;
use review_daemon::{self as daemon};
use review_pipeline::{Pipeline, PipelineConfig};
use review_render::browser::MockBrowser;
use review_render::template::Branding;
use review_render::RenderCoordinator;
use review_scheduler::Scheduler;
use review_store::Store;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "review-daemon", version, about = "Review-to-image service")]
struct Args {
    /// Path to the JSON configuration document.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Bind address, overriding `PORT`/`BASE_URL`.
    #[arg(long)]
    bind: Option<String>,

    /// Directory uploaded technician photos are stored under.
    #[arg(long, default_value = "./data/technicians")]
    technicians_dir: PathBuf,

    /// Enable debug-level logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("review_daemon=debug,review_pipeline=debug,review_scheduler=debug,info")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = config_loader::load_config(&args.config)
        .await
        .with_context(|| format!("load configuration document {}", args.config.display()))?;
    let settings = RuntimeSettings::from_env();
    let bind = args.bind.clone().unwrap_or_else(|| format!("0.0.0.0:{}", settings.port));

    tokio::fs::create_dir_all(&args.technicians_dir)
        .await
        .with_context(|| format!("create technicians dir {}", args.technicians_dir.display()))?;

    let http = reqwest::Client::new();
    let store = Store::open(config.ingestion.data_path.clone())
        .await
        .with_context(|| format!("open review store at {}", config.ingestion.data_path))?;
    let render = Arc::new(RenderCoordinator::new(Arc::new(MockBrowser::new())));

    let branding = Branding {
        company_name: config.company.name.clone(),
        company_phone: config.company.phone.clone(),
        logo_url: config.company.logo_url.clone(),
        brand_color: config.company.brand_color.clone(),
        brand_color_dark: config.company.brand_color_dark.clone(),
    };

    let default_size = SizePreset::parse(&config.ingestion.default_size)
        .with_context(|| format!("unknown default_size {:?} in configuration", config.ingestion.default_size))?;

    let built = build_adapters(&config.ingestion, http.clone());

    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        render.clone(),
        http.clone(),
        PipelineConfig {
            auto_generate: config.ingestion.auto_generate,
            auto_share: config.ingestion.auto_share,
            min_rating_for_auto_share: config.ingestion.min_rating_for_auto_share,
            default_template: config.ingestion.default_template.clone(),
            default_size,
            base_url: settings.base_url.clone(),
            chat: config.chat.clone(),
            chat_upload_endpoint: settings.chat_upload_endpoint.clone(),
        },
        branding.clone(),
    ));

    let scheduler = Arc::new(Scheduler::new(
        built.pollable,
        store.clone(),
        pipeline.clone(),
        config.ingestion.poll_interval_minutes,
    ));
    scheduler.initialize_all().await;
    let polling_tasks = if config.ingestion.enabled {
        scheduler.spawn_background_polling()
    } else {
        Vec::new()
    };
    let default_template = config.ingestion.default_template.clone();

    let state = Arc::new(AppState {
        config,
        base_url: settings.base_url.clone(),
        chat_upload_endpoint: settings.chat_upload_endpoint.clone(),
        branding,
        store: store.clone(),
        render: render.clone(),
        scheduler,
        pipeline,
        default_template,
        default_size,
        adapters_by_name: built.by_name,
        http,
        technicians_dir: args.technicians_dir,
        started_at: Instant::now(),
    });

    let app = daemon::build_app(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!(bind = %bind, "review-daemon listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;

    render.shutdown().await;
    store.shutdown().await.context("final store flush")?;
    for task in polling_tasks {
        task.abort();
    }
    Ok(())
}

/// Resolves once SIGINT or (on Unix) SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
