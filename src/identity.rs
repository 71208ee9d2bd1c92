use axum::http::HeaderMap;

pub const UNKNOWN_CLIENT: &str = "unknown";

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

// Headers stamped by the auth proxy in front of the gateway
const USER_ID: &str = "x-user-id";
const USER_EMAIL: &str = "x-user-email";
const USER_ROLE: &str = "x-user-role";
// Shared secret proving the auth proxy set the headers above
pub const IDENTITY_SECRET: &str = "x-identity-secret";

// Authenticated caller, as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub role: String,
}

// Source of the current session for an inbound request
pub trait SessionProvider: Send + Sync {
    fn current_session(&self, headers: &HeaderMap) -> Option<Session>;
}

// Reads the identity headers set by the auth proxy.
// Without a configured secret, or when the request does not carry it,
// the headers came from the client and are ignored.
pub struct HeaderSessionProvider {
    secret: Option<String>,
}

impl HeaderSessionProvider {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    fn is_verified(&self, headers: &HeaderMap) -> bool {
        match (&self.secret, header_str(headers, IDENTITY_SECRET)) {
            (Some(expected), Some(presented)) => constant_time_eq(expected, presented),
            _ => false,
        }
    }
}

impl SessionProvider for HeaderSessionProvider {
    fn current_session(&self, headers: &HeaderMap) -> Option<Session> {
        if !self.is_verified(headers) {
            return None;
        }
        let user_id = header_str(headers, USER_ID)?;

        Some(Session {
            user_id: user_id.to_string(),
            email: header_str(headers, USER_EMAIL).map(str::to_string),
            role: header_str(headers, USER_ROLE).unwrap_or("candidate").to_string(),
        })
    }
}

// Best-effort caller address: first `x-forwarded-for` entry, then `x-real-ip`
pub fn resolve_client_identity(headers: &HeaderMap) -> String {
    let first_hop = header_str(headers, FORWARDED_FOR)
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(first) = first_hop {
        return first.to_string();
    }

    header_str(headers, REAL_IP)
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

// Drops identity headers the auth proxy did not vouch for
pub fn strip_identity_headers(headers: &mut HeaderMap) {
    for name in [USER_ID, USER_EMAIL, USER_ROLE] {
        headers.remove(name);
    }
}

// Session email when there is one, caller address otherwise
pub fn user_or_client_key(session: Option<&Session>, headers: &HeaderMap) -> String {
    session
        .and_then(|s| s.email.clone())
        .unwrap_or_else(|| resolve_client_identity(headers))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (a_byte, b_byte) in a.bytes().zip(b.bytes()) {
        result |= a_byte ^ b_byte;
    }

    result == 0
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
