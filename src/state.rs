use std::sync::Arc;
use crate::identity::SessionProvider;
use crate::load_balancer::LoadBalancer;
use crate::policy::Policies;
// app's shared state, built once in main

pub struct AppState {
    pub client: reqwest::Client,            // forwards to upstreams, carries the timeout
    pub load_balancer: Arc<LoadBalancer>,
    pub policies: Policies,                 // one limiter per policy class
    pub sessions: Arc<dyn SessionProvider>,
}
