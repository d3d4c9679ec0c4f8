// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP middleware: request id tagging, access logging, CORS.

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::info;
use uuid::Uuid;

/// A unique request identifier, available as an Axum extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub Uuid);

/// Tags each request with a [`RequestId`] and echoes it as `X-Request-Id`.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let id = RequestId(Uuid::new_v4());
    req.extensions_mut().insert(id);
    let mut resp = next.run(req).await;
    resp.headers_mut()
        .insert("x-request-id", HeaderValue::from_str(&id.0.to_string()).unwrap());
    resp
}

/// Logs method, path, status, and duration for every request.
pub struct RequestLogger;

impl RequestLogger {
    /// Axum-compatible middleware function.
    pub async fn layer(req: Request, next: Next) -> Response {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let start = Instant::now();

        let resp = next.run(req).await;

        let duration = start.elapsed();
        info!(
            http.method = %method,
            http.path = %path,
            http.status = resp.status().as_u16(),
            http.duration_ms = duration.as_millis() as u64,
            "request completed"
        );

        resp
    }
}

/// Permissive CORS suitable for a service consumed by a browser-based
/// dashboard on another origin.
pub fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(AllowMethods::list([
            axum::http::Method::GET,
            axum::http::Method::POST,
        ]))
        .allow_headers(AllowHeaders::any())
}
