// SPDX-License-Identifier: MIT OR Apache-2.0
//! Chat share (C8): composes a review message and uploads the rendered
//! image via multipart/form-data to the chat workspace's file-upload
//! endpoint.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use review_core::config::ChatConfig;
use review_core::{OutputFormat, ReviewRecord};
use review_error::ReviewError;
use serde::Deserialize;

const STAR_GLYPH: char = '\u{2605}';

/// Precomputed platform display labels for chat messages (distinct from
/// `review-render`'s HTML badge snippets).
fn platform_label(source: &str) -> Option<&'static str> {
    match source {
        "google" => Some("Google"),
        "yelp" => Some("Yelp"),
        "facebook" => Some("Facebook"),
        _ => None,
    }
}

/// Compose the chat message body for a review: star prefix, platform
/// label (if known), reviewer name, block-quoted review text, and a
/// technician mention line when the record's `tech_name` matches the
/// configured mapping (`spec.md` §4.7).
pub fn compose_message(record: &ReviewRecord, chat: &ChatConfig) -> String {
    let stars = STAR_GLYPH.to_string().repeat(record.rating.clamp(0, 5) as usize);
    let mut lines = Vec::new();

    let header = match platform_label(&record.source) {
        Some(label) => format!("{stars} New {label} review from {}", record.reviewer_name),
        None => format!("{stars} New review from {}", record.reviewer_name),
    };
    lines.push(header);

    for line in record.review_text.lines() {
        lines.push(format!("> {line}"));
    }
    if record.review_text.is_empty() {
        lines.push("> ".to_string());
    }

    if let Some(tech_name) = &record.tech_name {
        if let Some(mention) = chat.mention_for(tech_name) {
            lines.push(format!("Technician: {mention}"));
        }
    }

    lines.join("\n")
}

fn slugify(input: &str) -> String {
    let mut out = String::new();
    let mut last_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash && !out.is_empty() {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        "review".to_string()
    } else {
        out
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Upload `image_bytes` to the chat's file-upload endpoint, carrying the
/// composed message as the initial comment. Succeeds iff the remote API
/// responds with `ok: true`.
pub async fn share(
    http: &reqwest::Client,
    upload_endpoint: &str,
    chat: &ChatConfig,
    record: &ReviewRecord,
    image_bytes: Vec<u8>,
    format: OutputFormat,
) -> Result<(), ReviewError> {
    let message = compose_message(record, chat);
    let title = format!("Review from {}", record.reviewer_name);
    let filename = format!(
        "review-{}-{}.{}",
        slugify(&record.reviewer_name),
        chrono::Utc::now().timestamp_millis(),
        format.extension()
    );

    let part = reqwest::multipart::Part::bytes(image_bytes)
        .file_name(filename.clone())
        .mime_str(format.content_type())
        .map_err(|err| ReviewError::internal("invalid content type for chat upload").with_source(err))?;

    let form = reqwest::multipart::Form::new()
        .text("channels", chat.channel.clone())
        .text("initial_comment", message)
        .text("title", title)
        .text("filename", filename)
        .part("file", part);

    let response = http
        .post(upload_endpoint)
        .bearer_auth(&chat.bot_token)
        .multipart(form)
        .send()
        .await
        .map_err(|err| ReviewError::upstream("chat upload request failed").with_source(err))?;

    if !response.status().is_success() {
        return Err(ReviewError::upstream("chat upload rejected")
            .with_context("status", response.status().as_u16()));
    }

    let body: UploadResponse = response
        .json()
        .await
        .map_err(|err| ReviewError::upstream("chat upload response malformed").with_source(err))?;

    if body.ok {
        Ok(())
    } else {
        Err(ReviewError::upstream(body.error.unwrap_or_else(|| "chat upload failed".to_string())))
    }
}
