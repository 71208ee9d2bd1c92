use clap::Parser;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "interview-gateway")]
#[command(about = "Admission gateway for the interview marketplace API")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "GATEWAY_PORT", default_value_t = 8080)]
    pub port: u16,

    // Upstream app servers (comma-separated)
    // Example: "localhost:3000,localhost:3001"
    #[arg(short, long, env = "GATEWAY_UPSTREAMS", default_value = "localhost:3000")]
    pub upstreams: String,

    // Path probed by the health checker on each upstream
    #[arg(long, env = "GATEWAY_HEALTH_PATH", default_value = "/api/health")]
    pub health_path: String,

    // Health check interval in seconds
    #[arg(long, env = "GATEWAY_HEALTH_INTERVAL", default_value_t = 30)]
    pub health_interval: u64,

    // Timeout for a forwarded request in seconds
    #[arg(long, env = "GATEWAY_UPSTREAM_TIMEOUT", default_value_t = 60)]
    pub upstream_timeout: u64,

    // Max distinct client keys tracked per policy
    #[arg(long, env = "GATEWAY_TRACKED_KEYS", default_value_t = 500)]
    pub tracked_keys: usize,

    // Signup window in seconds
    #[arg(long, env = "GATEWAY_AUTH_WINDOW", default_value_t = 15 * 60)]
    pub auth_window: u64,

    // AI endpoint window in seconds
    #[arg(long, env = "GATEWAY_AI_WINDOW", default_value_t = 60)]
    pub ai_window: u64,

    // Generic API window in seconds
    #[arg(long, env = "GATEWAY_API_WINDOW", default_value_t = 60)]
    pub api_window: u64,

    // Secret the auth proxy sends in x-identity-secret; identity headers are ignored without it
    #[arg(long, env = "GATEWAY_IDENTITY_SECRET")]
    pub identity_secret: Option<String>,

    // Limit for API routes without their own entry
    #[arg(long, env = "GATEWAY_DEFAULT_API_LIMIT", default_value_t = 10)]
    pub default_api_limit: u32,
}
