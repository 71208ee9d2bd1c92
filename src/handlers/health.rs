use axum::{Json, extract::State};
use std::sync::Arc;
use crate::models::{HealthResponse, TrackedKeys, UpstreamStatus};
use crate::policy::PolicyClass;
use crate::state::AppState;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let upstreams: Vec<UpstreamStatus> = state
        .load_balancer
        .upstreams()
        .iter()
        .map(|u| UpstreamStatus {
            url: u.url.clone(),
            healthy: u.is_healthy(),
        })
        .collect();

    // degraded: nothing to forward to
    let status = if upstreams.iter().any(|u| u.healthy) {
        "healthy"
    } else {
        "degraded"
    };

    let tracked = |class: PolicyClass| state.policies.limiter(class).tracked_keys();

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        upstreams,
        tracked_keys: TrackedKeys {
            auth: tracked(PolicyClass::Auth),
            ai: tracked(PolicyClass::Ai),
            api: tracked(PolicyClass::Api),
        },
    })
}
