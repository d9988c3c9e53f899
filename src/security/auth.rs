//! Shared-secret authentication.

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Json,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::api::ErrorResponse;

/// Shortest secret accepted by [`HashAuth::new`].
pub const MIN_HASH_LEN: usize = 32;

/// Checks the `hash` query parameter against a configured secret.
///
/// Only the SHA-256 digest of the secret is kept, and candidates are
/// compared digest to digest so the comparison time does not depend on
/// how much of the raw secret matched.
#[derive(Clone)]
pub struct HashAuth {
    digest: Option<[u8; 32]>,
}

impl HashAuth {
    /// Require `secret` on every protected request.
    pub fn new(secret: &str) -> Self {
        Self {
            digest: Some(digest(secret)),
        }
    }

    /// Accept every request.
    pub fn disabled() -> Self {
        Self { digest: None }
    }

    /// Build from an optional configured secret.
    pub fn from_config(secret: Option<&str>) -> Self {
        secret.map_or_else(Self::disabled, Self::new)
    }

    /// Whether a secret is required.
    pub fn is_enabled(&self) -> bool {
        self.digest.is_some()
    }

    /// Check a candidate secret.
    pub fn verify(&self, candidate: Option<&str>) -> bool {
        match (&self.digest, candidate) {
            (None, _) => true,
            (Some(expected), Some(candidate)) => digest(candidate) == *expected,
            (Some(_), None) => false,
        }
    }
}

impl std::fmt::Debug for HashAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashAuth")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

fn digest(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

/// The query parameter carrying the secret.
#[derive(Debug, Deserialize)]
pub struct HashParam {
    pub hash: Option<String>,
}

/// Authentication middleware for axum. `/health` is always open.
pub async fn hash_middleware(
    State(auth): State<Arc<HashAuth>>,
    Query(param): Query<HashParam>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    if request.uri().path() == "/health" || auth.verify(param.hash.as_deref()) {
        return Ok(next.run(request).await);
    }

    Err((
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::unauthorized("Invalid or missing 'hash' parameter")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_disabled_accepts_everything() {
        let auth = HashAuth::disabled();
        assert!(!auth.is_enabled());
        assert!(auth.verify(None));
        assert!(auth.verify(Some("anything")));
    }

    #[test]
    fn test_enabled_requires_match() {
        let auth = HashAuth::new(SECRET);
        assert!(auth.is_enabled());
        assert!(auth.verify(Some(SECRET)));
        assert!(!auth.verify(Some("0123456789abcdef0123456789abcdeF")));
        assert!(!auth.verify(Some("")));
        assert!(!auth.verify(None));
    }

    #[test]
    fn test_from_config() {
        assert!(!HashAuth::from_config(None).is_enabled());
        assert!(HashAuth::from_config(Some(SECRET)).verify(Some(SECRET)));
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", HashAuth::new(SECRET));
        assert!(!rendered.contains(SECRET));
        assert!(rendered.contains("enabled: true"));
    }
}
