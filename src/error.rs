use axum::Json;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::models::RateLimitBody;
use crate::rate_limit::RateLimitResult;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{message}")]
    RateLimited {
        message: &'static str,
        result: RateLimitResult,
    },
    #[error("no healthy upstream available")]
    NoHealthyUpstream,
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("failed to encode metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

// Quota headers shared by 429s and admitted responses
pub fn insert_rate_limit_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(result.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(result.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(result.reset));
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::RateLimited { message, result } => {
                let body = RateLimitBody {
                    error: message.to_string(),
                    limit: result.limit,
                    remaining: 0,
                    reset: result.reset,
                };
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                insert_rate_limit_headers(response.headers_mut(), &RateLimitResult { remaining: 0, ..result });
                response
            }
            GatewayError::NoHealthyUpstream => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": self.to_string() })),
            )
                .into_response(),
            GatewayError::Upstream(ref e) => {
                tracing::error!(error = %e, "upstream request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(serde_json::json!({ "error": "Upstream request failed" })),
                )
                    .into_response()
            }
            GatewayError::Metrics(ref e) => {
                tracing::error!(error = %e, "metrics encoding failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
