//! Shared-secret API key check for `/api/*`.

use crate::error::ApiError;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Expected key, stored only as its SHA-256 digest.
#[derive(Clone)]
pub struct ApiKeyCheck {
    enabled: bool,
    expected: Option<[u8; 32]>,
}

impl ApiKeyCheck {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            expected: None,
        }
    }

    pub fn new(enabled: bool, api_key: Option<&str>) -> Self {
        let expected = api_key.filter(|key| !key.is_empty()).map(digest);
        Self { enabled, expected }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Decide whether a request carrying `presented` may proceed.
    pub fn verify(&self, presented: Option<&str>) -> Result<(), ApiError> {
        if !self.enabled {
            return Ok(());
        }
        let expected = self.expected.ok_or(ApiError::ApiKeyNotSet)?;
        match presented {
            // Comparing fixed-size digests keeps the key length out of the timing.
            Some(key) if digest(key) == expected => Ok(()),
            _ => Err(ApiError::Unauthorized),
        }
    }
}

impl std::fmt::Debug for ApiKeyCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyCheck")
            .field("enabled", &self.enabled)
            .field("configured", &self.expected.is_some())
            .finish()
    }
}

fn digest(key: &str) -> [u8; 32] {
    Sha256::digest(key.as_bytes()).into()
}

pub async fn require_api_key(
    State(check): State<Arc<ApiKeyCheck>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if let Err(e) = check.verify(presented) {
        log::warn!("Rejected {} {}: {}", request.method(), request.uri().path(), e);
        return Err(e);
    }
    Ok(next.run(request).await)
}
