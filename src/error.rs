//! Error taxonomy for the security pipeline.
//!
//! Only `Validation`, `RateLimited`, `Banned` and `DdosBlocked` become client
//! responses. Store faults never surface: callers fail open (enforcement) or
//! degrade to empty results (reporting). Wrapped-handler errors are not part
//! of this taxonomy at all — the pipeline audits them and re-returns them
//! unchanged.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::store::StoreError;
use crate::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("input validation failed ({} violations)", .0.len())]
    Validation(Vec<ValidationError>),

    #[error("rate limit exceeded: limit {limit}, retry after {retry_after_secs}s")]
    RateLimited {
        limit: u64,
        remaining: u64,
        reset_at_ms: u64,
        retry_after_secs: u64,
    },

    #[error("client banned: {reason}")]
    Banned { reason: String, expires_at_ms: u64 },

    #[error("request blocked by ddos heuristics")]
    DdosBlocked,

    /// Infrastructure-only; callers convert this into fail-open or
    /// degraded-empty behavior instead of returning it to clients.
    #[error("shared store unavailable")]
    StoreUnavailable(#[from] StoreError),
}

impl SecurityError {
    /// Machine-readable category carried in every structured response.
    pub fn category(&self) -> &'static str {
        match self {
            SecurityError::Validation(_) => "validation_error",
            SecurityError::RateLimited { .. } => "rate_limit_exceeded",
            SecurityError::Banned { .. } => "banned",
            SecurityError::DdosBlocked => "ddos_blocked",
            SecurityError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl IntoResponse for SecurityError {
    fn into_response(self) -> Response {
        match self {
            SecurityError::Validation(errors) => {
                let details: Vec<_> = errors
                    .iter()
                    .map(|e| {
                        json!({
                            "kind": e.kind,
                            "field": e.field,
                            "message": e.message,
                        })
                    })
                    .collect();
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": {
                            "category": "validation_error",
                            "message": "request failed input validation",
                            "details": details,
                        }
                    })),
                )
                    .into_response()
            }
            SecurityError::RateLimited {
                limit,
                remaining,
                reset_at_ms,
                retry_after_secs,
            } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({
                        "error": {
                            "category": "rate_limit_exceeded",
                            "message": "too many requests",
                            "retry_after_secs": retry_after_secs,
                        }
                    })),
                )
                    .into_response();
                let headers = response.headers_mut();
                if let Ok(v) = limit.to_string().parse() {
                    headers.insert("X-RateLimit-Limit", v);
                }
                if let Ok(v) = remaining.to_string().parse() {
                    headers.insert("X-RateLimit-Remaining", v);
                }
                if let Ok(v) = reset_at_ms.to_string().parse() {
                    headers.insert("X-RateLimit-Reset", v);
                }
                if let Ok(v) = retry_after_secs.to_string().parse() {
                    headers.insert(header::RETRY_AFTER, v);
                }
                response
            }
            SecurityError::Banned { expires_at_ms, .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": {
                        "category": "banned",
                        "message": "access temporarily restricted",
                        "expires_at_ms": expires_at_ms,
                    }
                })),
            )
                .into_response(),
            SecurityError::DdosBlocked => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": {
                        "category": "ddos_blocked",
                        "message": "request rejected",
                    }
                })),
            )
                .into_response(),
            // Only admin handlers surface this; the pipeline never does.
            SecurityError::StoreUnavailable(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": {
                        "category": "store_unavailable",
                        "message": "internal storage error",
                    }
                })),
            )
                .into_response(),
        }
    }
}
