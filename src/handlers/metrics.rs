use axum::extract::State;
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use crate::error::GatewayError;
use crate::metrics::TRACKED_KEYS;
use crate::policy::PolicyClass;
use crate::state::AppState;

pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<String, GatewayError> {
    for class in [PolicyClass::Auth, PolicyClass::Ai, PolicyClass::Api] {
        TRACKED_KEYS
            .with_label_values(&[class.as_str()])
            .set(state.policies.limiter(class).tracked_keys() as f64);
    }

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
