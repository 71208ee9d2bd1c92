use axum::{Router, routing::{any, get}};
use std::sync::Arc;
use crate::state::AppState;

mod health;
mod metrics;
mod proxy;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use proxy::proxy_handler;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/{*path}", any(proxy_handler)) // every API call goes through admission
        .with_state(state)
}
