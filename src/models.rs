use serde::{Deserialize, Serialize};

// 429 body
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RateLimitBody {
    pub error: String,
    pub limit: u32,
    pub remaining: u32,
    pub reset: i64, // epoch millis
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UpstreamStatus {
    pub url: String,
    pub healthy: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TrackedKeys {
    pub auth: usize,
    pub ai: usize,
    pub api: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub upstreams: Vec<UpstreamStatus>,
    pub tracked_keys: TrackedKeys,
}
