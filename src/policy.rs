use crate::config::Args;
use crate::rate_limit::{RateLimitError, RateLimiter};
use std::fmt;
use std::time::Duration;

// Named rate-limit configuration shared by a group of endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyClass {
    Auth,
    Ai,
    Api,
}

impl PolicyClass {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyClass::Auth => "auth",
            PolicyClass::Ai => "ai",
            PolicyClass::Api => "api",
        }
    }

    // Body text of a 429 for this class
    pub fn rejection_message(self) -> &'static str {
        match self {
            PolicyClass::Auth => "Too many signup attempts. Please try again later.",
            PolicyClass::Ai | PolicyClass::Api => "Rate limit exceeded",
        }
    }
}

impl fmt::Display for PolicyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// What a protected route is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePolicy {
    pub class: PolicyClass,
    pub limit: u32,
    // Echo quota headers on admitted responses
    pub echo_headers: bool,
}

impl RoutePolicy {
    const fn new(class: PolicyClass, limit: u32, echo_headers: bool) -> Self {
        Self {
            class,
            limit,
            echo_headers,
        }
    }
}

// (path, policy); prefixes end with '/'
const ROUTES: &[(&str, RoutePolicy)] = &[
    ("/api/auth/signup", RoutePolicy::new(PolicyClass::Auth, 5, false)),
    ("/api/ai/parse-job", RoutePolicy::new(PolicyClass::Ai, 5, true)),
    ("/api/ai/parse-resume", RoutePolicy::new(PolicyClass::Ai, 5, true)),
    ("/api/ai/gap-analysis", RoutePolicy::new(PolicyClass::Ai, 3, true)),
    ("/api/ai/roadmap", RoutePolicy::new(PolicyClass::Ai, 3, true)),
    ("/api/ai/interview", RoutePolicy::new(PolicyClass::Ai, 5, true)),
    ("/api/ai/match-experts", RoutePolicy::new(PolicyClass::Ai, 5, true)),
    ("/api/ai/", RoutePolicy::new(PolicyClass::Ai, 3, true)),
    ("/api/jobs/scrape", RoutePolicy::new(PolicyClass::Api, 3, true)),
    ("/api/payments/", RoutePolicy::new(PolicyClass::Api, 5, false)),
    ("/api/bookings/", RoutePolicy::new(PolicyClass::Api, 10, false)),
    ("/api/sessions/", RoutePolicy::new(PolicyClass::Api, 10, false)),
];

// The three independent limiters, one per policy class
pub struct Policies {
    auth: RateLimiter,
    ai: RateLimiter,
    api: RateLimiter,
    default_api_limit: u32,
}

impl Policies {
    pub fn from_args(args: &Args) -> Result<Self, RateLimitError> {
        Ok(Self {
            auth: RateLimiter::new(Duration::from_secs(args.auth_window), args.tracked_keys)?,
            ai: RateLimiter::new(Duration::from_secs(args.ai_window), args.tracked_keys)?,
            api: RateLimiter::new(Duration::from_secs(args.api_window), args.tracked_keys)?,
            default_api_limit: args.default_api_limit,
        })
    }

    pub fn limiter(&self, class: PolicyClass) -> &RateLimiter {
        match class {
            PolicyClass::Auth => &self.auth,
            PolicyClass::Ai => &self.ai,
            PolicyClass::Api => &self.api,
        }
    }

    // Exact match first, then the longest matching prefix, then the API default
    pub fn route_policy(&self, path: &str) -> RoutePolicy {
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        ROUTES
            .iter()
            .filter(|(route, _)| route_matches(route, path))
            .max_by_key(|(route, _)| route.len())
            .map(|(_, policy)| *policy)
            .unwrap_or(RoutePolicy::new(
                PolicyClass::Api,
                self.default_api_limit,
                false,
            ))
    }
}

fn route_matches(route: &str, path: &str) -> bool {
    match route.strip_suffix('/') {
        Some(prefix) => path == prefix || path.starts_with(route),
        None => path == route,
    }
}
