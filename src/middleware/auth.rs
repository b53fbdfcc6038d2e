use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};

use crate::error::ApiError;
use crate::middleware::rate_limit::ClientIdentity;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Compares a caller-supplied key with the configured secret.
///
/// Both sides are compared as SHA-256 digests without early exit. An empty
/// configured secret denies everything.
#[derive(Clone)]
pub struct ApiKeyGuard {
    expected: Option<[u8; 32]>,
}

impl ApiKeyGuard {
    pub fn new(secret: &str) -> Self {
        let expected = if secret.is_empty() { None } else { Some(digest(secret.as_bytes())) };
        Self { expected }
    }

    pub fn is_configured(&self) -> bool {
        self.expected.is_some()
    }

    pub fn allows(&self, supplied: Option<&[u8]>) -> bool {
        match (&self.expected, supplied) {
            (Some(expected), Some(supplied)) => {
                let supplied = digest(supplied);
                expected
                    .iter()
                    .zip(supplied.iter())
                    .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                    == 0
            }
            _ => false,
        }
    }
}

fn digest(value: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(value));
    out
}

/// Rejects requests whose X-API-KEY does not match the configured secret
pub async fn api_key_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let supplied = headers.get(API_KEY_HEADER).map(|v| v.as_bytes());

    if !state.guard.allows(supplied) {
        let client = request
            .extensions()
            .get::<ClientIdentity>()
            .map(|c| c.0.clone())
            .unwrap_or_default();
        tracing::warn!(
            client = %client,
            path = %request.uri().path(),
            key_present = supplied.is_some(),
            "API key rejected"
        );
        return ApiError::unauthorized("Invalid or missing API key").into_response();
    }

    next.run(request).await
}
