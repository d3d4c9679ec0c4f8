// SPDX-License-Identifier: MIT OR Apache-2.0
//! Webhook HMAC verification (`spec.md` §4.6).
//!
//! The signature is `"sha256=" + hex(HMAC-SHA256(secret, raw_body))`.
//! `spec.md` requires the header to match "either of the two accepted
//! header names (see §6)" without ever naming them (§6's endpoint table
//! has no such list) — an open question resolved here: accept either
//! `X-Hub-Signature-256` (the GitHub/Meta convention) or
//! `X-Webhook-Signature` (a generic fallback for platforms without one).

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header names checked for a valid signature, in order.
pub const SIGNATURE_HEADERS: [&str; 2] = ["x-hub-signature-256", "x-webhook-signature"];

/// True if `headers` carries a valid signature of `body` under `secret` on
/// either accepted header name.
pub fn verify(secret: &str, body: &[u8], headers: &HeaderMap) -> bool {
    let expected = sign(secret, body);
    SIGNATURE_HEADERS.iter().any(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|value| constant_time_eq(value.as_bytes(), expected.as_bytes()))
    })
}

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
