// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy for the review image service.
//!
//! Every fallible operation in this workspace returns a [`ReviewError`],
//! which carries an [`ErrorKind`] (the five kinds from the service's error
//! handling design), a human-readable message, optional field-level
//! validation details, and arbitrary key-value context. The HTTP surface
//! maps [`ErrorKind`] to a status code; nothing below that layer needs to
//! know about HTTP.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Broad family an error belongs to; the HTTP layer maps this to a status
/// code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Validation failure: missing/oversize fields, unknown enum values,
    /// empty or oversized batches, unknown template, unknown adapter on a
    /// manual poll. Maps to HTTP 400.
    BadRequest,
    /// Webhook HMAC signature mismatch. Maps to HTTP 401.
    Unauthorized,
    /// Unknown stored review id, or unknown adapter in `poll_once`. Maps to
    /// HTTP 404.
    NotFound,
    /// A remote adapter or the chat API returned an error. Maps to HTTP 502.
    UpstreamError,
    /// Unclassified rendering or I/O failure. Maps to HTTP 500.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::UpstreamError => "upstream_error",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl ErrorKind {
    /// The conventional HTTP status code for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::UpstreamError => 502,
            Self::Internal => 500,
        }
    }
}

// ---------------------------------------------------------------------------
// FieldError
// ---------------------------------------------------------------------------

/// A single field-level validation failure, used by [`ErrorKind::BadRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    /// Name of the offending field.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl FieldError {
    /// Construct a new field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ReviewError
// ---------------------------------------------------------------------------

/// Unified service error.
///
/// # Builder usage
///
/// ```
/// use review_error::{ReviewError, ErrorKind};
///
/// let err = ReviewError::new(ErrorKind::UpstreamError, "adapter fetch failed")
///     .with_context("source", "google")
///     .with_context("status", 503);
/// ```
pub struct ReviewError {
    /// Machine-readable error kind.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Field-level validation failures (populated for `BadRequest`).
    pub details: Vec<FieldError>,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured diagnostic context.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl ReviewError {
    /// Create a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Vec::new(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Shorthand for [`ErrorKind::BadRequest`].
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    /// Shorthand for [`ErrorKind::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Shorthand for [`ErrorKind::Unauthorized`].
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// Shorthand for [`ErrorKind::UpstreamError`].
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamError, message)
    }

    /// Shorthand for [`ErrorKind::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Attach field-level validation failures.
    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.details = details;
        self
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if
    /// serialisation fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Debug for ReviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ReviewError");
        d.field("kind", &self.kind);
        d.field("message", &self.message);
        if !self.details.is_empty() {
            d.field("details", &self.details);
        }
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for ReviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ReviewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// JSON error body shape returned by the HTTP surface: `{error, details?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Field-level validation details, present only for `BadRequest`.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub details: Vec<FieldError>,
}

impl From<&ReviewError> for ErrorBody {
    fn from(err: &ReviewError) -> Self {
        Self {
            error: err.message.clone(),
            details: err.details.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(ErrorKind::BadRequest.http_status(), 400);
        assert_eq!(ErrorKind::Unauthorized.http_status(), 401);
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
        assert_eq!(ErrorKind::UpstreamError.http_status(), 502);
        assert_eq!(ErrorKind::Internal.http_status(), 500);
    }

    #[test]
    fn display_without_context() {
        let err = ReviewError::not_found("no such review");
        assert_eq!(err.to_string(), "[not_found] no such review");
    }

    #[test]
    fn builder_chaining() {
        let err = ReviewError::upstream("fetch failed")
            .with_context("source", "google")
            .with_details(vec![FieldError::new("rating", "must be 1..5")]);
        assert_eq!(err.context["source"], serde_json::json!("google"));
        assert_eq!(err.details.len(), 1);
        assert_eq!(err.details[0].field, "rating");
    }

    #[test]
    fn with_source_preserves_chain() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = ReviewError::internal("save failed").with_source(inner);
        let src = std::error::Error::source(&err).unwrap();
        assert_eq!(src.to_string(), "file missing");
    }

    #[test]
    fn error_body_roundtrip() {
        let err = ReviewError::bad_request("invalid rating")
            .with_details(vec![FieldError::new("rating", "out of range")]);
        let body: ErrorBody = (&err).into();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "invalid rating");
        assert_eq!(json["details"][0]["field"], "rating");
    }

    #[test]
    fn error_body_omits_empty_details() {
        let err = ReviewError::not_found("gone");
        let body: ErrorBody = (&err).into();
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("details").is_none());
    }
}
