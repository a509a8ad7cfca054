//! Credential gate in front of the dashboard routes.

use crate::api::handlers::unauthorized_response;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid bearer token")]
    InvalidToken,
}

pub trait AccessPolicy: Send + Sync + std::fmt::Debug {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), AccessDenied>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn authorize(&self, _headers: &HeaderMap) -> Result<(), AccessDenied> {
        Ok(())
    }
}

/// Requires `Authorization: Bearer <token>` matching the configured token.
#[derive(Clone)]
pub struct SharedToken {
    token: String,
}

impl SharedToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for SharedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedToken")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl AccessPolicy for SharedToken {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), AccessDenied> {
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(AccessDenied::MissingToken)?;
        if constant_time_eq(presented.as_bytes(), self.token.as_bytes()) {
            Ok(())
        } else {
            Err(AccessDenied::InvalidToken)
        }
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

pub async fn require_access(
    State(policy): State<Arc<dyn AccessPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    match policy.authorize(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(denied) => {
            warn!(path = %request.uri().path(), reason = %denied, "Request rejected");
            unauthorized_response(denied.to_string(), SystemTime::now())
        }
    }
}
