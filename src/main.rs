mod config;
mod error;
mod handlers;
mod identity;
mod load_balancer;
mod metrics;
mod models;
mod policy;
mod rate_limit;
mod state;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::config::Args;
use crate::identity::HeaderSessionProvider;
use crate::load_balancer::{LoadBalancer, health_checker};
use crate::policy::{Policies, PolicyClass};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();

    let load_balancer = Arc::new(LoadBalancer::new(&args.upstreams).context("invalid upstream list")?);
    let policies = Policies::from_args(&args).context("invalid rate limit settings")?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.upstream_timeout))
        .redirect(reqwest::redirect::Policy::none()) // relay 3xx as-is
        .build()
        .context("failed to build upstream client")?;

    let state = Arc::new(AppState {
        client,
        load_balancer: Arc::clone(&load_balancer),
        policies,
        sessions: Arc::new(HeaderSessionProvider::new(args.identity_secret.clone())),
    });

    // spawn the health checker
    tokio::spawn(health_checker(
        load_balancer,
        reqwest::Client::new(),
        args.health_path.clone(),
        Duration::from_secs(args.health_interval),
    ));

    if args.identity_secret.is_none() {
        tracing::warn!("no identity secret configured, all callers are keyed by address");
    }

    let app = handlers::router(Arc::clone(&state));

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(port = args.port, "gateway listening");
    for class in [PolicyClass::Auth, PolicyClass::Ai, PolicyClass::Api] {
        tracing::info!(
            policy = %class,
            window = ?state.policies.limiter(class).window(),
            tracked_keys = args.tracked_keys,
            "rate limit policy"
        );
    }

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
