// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration document loading and environment overrides (`spec.md` §6).

use anyhow::{Context, Result};
use review_core::config::AppConfig;
use std::path::Path;

/// Default HTTP port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3000;

/// Runtime settings layered on top of the JSON config document.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// Bind port.
    pub port: u16,
    /// Base URL used to resolve relative asset URLs in templates.
    pub base_url: String,
    /// Chat file-upload endpoint. Chat sharing stays disabled without one,
    /// even if `chat` is configured (`spec.md` §4.7 treats the endpoint as
    /// opaque to the core; this workspace reads it from the environment
    /// rather than the config document).
    pub chat_upload_endpoint: Option<String>,
}

impl RuntimeSettings {
    /// Read `PORT`, `BASE_URL`, and `CHAT_UPLOAD_ENDPOINT` from the
    /// environment, falling back to sensible defaults.
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let base_url = std::env::var("BASE_URL").unwrap_or_else(|_| format!("http://127.0.0.1:{port}"));
        let chat_upload_endpoint = std::env::var("CHAT_UPLOAD_ENDPOINT").ok();
        Self { port, base_url, chat_upload_endpoint }
    }
}

/// Load and parse the JSON configuration document at `path`.
///
/// The caller is expected to exit the process on error: an absent or
/// invalid document must not leave the daemon running with partial state.
pub async fn load_config(path: &Path) -> Result<AppConfig> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("read config document {}", path.display()))?;
    let config: AppConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config document {}", path.display()))?;
    Ok(config)
}
