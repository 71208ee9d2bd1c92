use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri, header};
use axum::response::Response;
use std::sync::Arc;
use std::time::Instant;
use crate::error::{GatewayError, insert_rate_limit_headers};
use crate::identity::{resolve_client_identity, strip_identity_headers, user_or_client_key};
use crate::metrics::{ADMISSIONS_TOTAL, REQUEST_TOTAL, TRACKED_KEYS, UPSTREAM_LATENCY};
use crate::policy::{PolicyClass, RoutePolicy};
use crate::rate_limit::RateLimitResult;
use crate::state::AppState;

// Runs the admission check for one request
fn admit(
    state: &AppState,
    policy: RoutePolicy,
    headers: &HeaderMap,
) -> Result<RateLimitResult, GatewayError> {
    let class = policy.class;

    // signup is keyed by address only, the rest by user when known
    let key = match class {
        PolicyClass::Auth => resolve_client_identity(headers),
        PolicyClass::Ai | PolicyClass::Api => {
            let session = state.sessions.current_session(headers);
            if let Some(s) = &session {
                tracing::debug!(user_id = %s.user_id, role = %s.role, "authenticated caller");
            }
            user_or_client_key(session.as_ref(), headers)
        }
    };

    let limiter = state.policies.limiter(class);
    let result = limiter.check(policy.limit, &key);
    TRACKED_KEYS
        .with_label_values(&[class.as_str()])
        .set(limiter.tracked_keys() as f64);

    if result.success {
        ADMISSIONS_TOTAL.with_label_values(&[class.as_str(), "admitted"]).inc();
        return Ok(result);
    }

    ADMISSIONS_TOTAL.with_label_values(&[class.as_str(), "rejected"]).inc();
    tracing::warn!(policy = %class, key = %key, limit = policy.limit, reset = result.reset, "rate limit exceeded");

    Err(GatewayError::RateLimited {
        message: class.rejection_message(),
        result,
    })
}

pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    mut headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    REQUEST_TOTAL.inc();

    let policy = state.policies.route_policy(uri.path());
    let admission = admit(&state, policy, &headers)?;

    let upstream = state
        .load_balancer
        .next_upstream()
        .ok_or(GatewayError::NoHealthyUpstream)?;

    let path_and_query = uri.path_and_query().map_or(uri.path(), |pq| pq.as_str());
    let url = format!("{}{}", upstream.url, path_and_query);
    headers.remove(header::HOST);
    if state.sessions.current_session(&headers).is_none() {
        strip_identity_headers(&mut headers);
    }

    tracing::debug!(method = %method, url = %url, "forwarding request");
    let start_time = Instant::now();

    let upstream_res = match state
        .client
        .request(method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await
    {
        Ok(res) => res,
        Err(e) => {
            // unreachable upstream: take it out of rotation until the next probe
            if e.is_connect() {
                upstream.set_healthy(false);
                tracing::warn!(url = %upstream.url, "upstream unreachable, marked unhealthy");
            }
            return Err(e.into());
        }
    };

    let status = upstream_res.status();
    let mut response_headers = upstream_res.headers().clone();
    let bytes = upstream_res.bytes().await?;

    UPSTREAM_LATENCY.observe(start_time.elapsed().as_secs_f64());

    response_headers.remove(header::TRANSFER_ENCODING);
    response_headers.remove(header::CONNECTION);
    if policy.echo_headers {
        insert_rate_limit_headers(&mut response_headers, &admission);
    }

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Args;
    use crate::handlers::router;
    use crate::identity::HeaderSessionProvider;
    use crate::load_balancer::LoadBalancer;
    use crate::models::RateLimitBody;
    use crate::policy::Policies;
    use axum::body::to_bytes;
    use axum::http::{Request, StatusCode};
    use clap::Parser;
    use tower::ServiceExt;
    use wiremock::matchers::{body_string, method as http_method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &str = "proxy-secret";

    fn test_state(upstreams: &str) -> Arc<AppState> {
        let args = Args::parse_from(["interview-gateway", "--upstreams", upstreams]);
        Arc::new(AppState {
            client: reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .unwrap(),
            load_balancer: Arc::new(LoadBalancer::new(&args.upstreams).unwrap()),
            policies: Policies::from_args(&args).unwrap(),
            sessions: Arc::new(HeaderSessionProvider::new(Some(SECRET.to_string()))),
        })
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> Response {
        router(Arc::clone(state)).oneshot(request).await.unwrap()
    }

    fn post(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::from("{}")).unwrap()
    }

    #[tokio::test]
    async fn test_fifth_signup_from_one_address_is_rejected() {
        let upstream = MockServer::start().await;
        Mock::given(http_method("POST"))
            .and(path("/api/auth/signup"))
            .respond_with(ResponseTemplate::new(201))
            // four from the first address, one from the second
            .expect(5)
            .mount(&upstream)
            .await;
        let state = test_state(&upstream.uri());

        for _ in 0..4 {
            let res = send(&state, post("/api/auth/signup", &[("x-forwarded-for", "203.0.113.7, 10.0.0.1")])).await;
            assert_eq!(res.status(), StatusCode::CREATED);
            // signup does not echo quota headers
            assert!(res.headers().get("x-ratelimit-remaining").is_none());
        }

        let res = send(&state, post("/api/auth/signup", &[("x-forwarded-for", "203.0.113.7")])).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers()["x-ratelimit-limit"], "5");
        assert_eq!(res.headers()["x-ratelimit-remaining"], "0");

        let reset: i64 = res.headers()["x-ratelimit-reset"].to_str().unwrap().parse().unwrap();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: RateLimitBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.error, "Too many signup attempts. Please try again later.");
        assert_eq!(body.limit, 5);
        assert_eq!(body.remaining, 0);
        assert_eq!(body.reset, reset);

        // other addresses are unaffected
        let res = send(&state, post("/api/auth/signup", &[("x-real-ip", "198.51.100.4")])).await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_ai_route_echoes_quota_and_keys_by_email() {
        let upstream = MockServer::start().await;
        Mock::given(http_method("POST"))
            .and(path("/api/ai/gap-analysis"))
            .and(body_string("{}"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "gaps": [] })))
            .mount(&upstream)
            .await;
        let state = test_state(&upstream.uri());

        // same user from two addresses shares one quota
        let first = send(
            &state,
            post("/api/ai/gap-analysis", &[("x-identity-secret", SECRET), ("x-user-id", "u_1"), ("x-user-email", "sam@example.com"), ("x-real-ip", "10.0.0.1")]),
        )
        .await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()["x-ratelimit-limit"], "3");
        assert_eq!(first.headers()["x-ratelimit-remaining"], "2");

        let second = send(
            &state,
            post("/api/ai/gap-analysis", &[("x-identity-secret", SECRET), ("x-user-id", "u_1"), ("x-user-email", "sam@example.com"), ("x-real-ip", "10.0.0.2")]),
        )
        .await;
        assert_eq!(second.headers()["x-ratelimit-remaining"], "1");
        let body = to_bytes(second.into_body(), usize::MAX).await.unwrap();
        assert_eq!(serde_json::from_slice::<serde_json::Value>(&body).unwrap(), serde_json::json!({ "gaps": [] }));

        let third = send(
            &state,
            post("/api/ai/gap-analysis", &[("x-identity-secret", SECRET), ("x-user-id", "u_1"), ("x-user-email", "sam@example.com")]),
        )
        .await;
        assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = to_bytes(third.into_body(), usize::MAX).await.unwrap();
        let body: RateLimitBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.error, "Rate limit exceeded");

        // anonymous caller has its own quota
        let anon = send(&state, post("/api/ai/gap-analysis", &[("x-real-ip", "10.0.0.1")])).await;
        assert_eq!(anon.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_generic_route_forwards_query_without_echo() {
        let upstream = MockServer::start().await;
        Mock::given(http_method("GET"))
            .and(path("/api/bookings/b_9"))
            .and(query_param("expand", "expert"))
            .respond_with(ResponseTemplate::new(200).insert_header("x-app", "marketplace"))
            .expect(1)
            .mount(&upstream)
            .await;
        let state = test_state(&upstream.uri());

        let req = Request::builder()
            .uri("/api/bookings/b_9?expand=expert")
            .body(Body::empty())
            .unwrap();
        let res = send(&state, req).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-app"], "marketplace");
        assert!(res.headers().get("x-ratelimit-limit").is_none());
        assert_eq!(state.policies.limiter(PolicyClass::Api).current_count("unknown"), Some(1));
    }

    #[tokio::test]
    async fn test_admitted_request_without_upstream_is_503() {
        let state = test_state("localhost:1");
        state.load_balancer.upstreams()[0].set_healthy(false);

        let res = send(&state, post("/api/ai/roadmap", &[("x-real-ip", "10.0.0.3")])).await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        // the attempt still counted
        assert_eq!(state.policies.limiter(PolicyClass::Ai).current_count("10.0.0.3"), Some(1));
    }

    #[tokio::test]
    async fn test_health_reports_upstreams_and_keys() {
        let state = test_state("localhost:1");
        state.policies.limiter(PolicyClass::Auth).check(5, "10.0.0.1");

        let res = send(&state, Request::builder().uri("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(res.status(), StatusCode::OK);

        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["upstreams"][0]["url"], "http://localhost:1");
        assert_eq!(json["tracked_keys"]["auth"], 1);
        assert_eq!(json["tracked_keys"]["ai"], 0);
    }

    #[tokio::test]
    async fn test_unverified_identity_headers_do_not_change_the_key() {
        let upstream = MockServer::start().await;
        Mock::given(http_method("POST"))
            .and(path("/api/ai/roadmap"))
            // spoofed identity never reaches the app
            .and(|req: &wiremock::Request| !req.headers.contains_key("x-user-email"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&upstream)
            .await;
        let state = test_state(&upstream.uri());

        let mut admitted = 0;
        for i in 0..20 {
            let email = format!("caller{i}@example.com");
            let res = send(
                &state,
                post("/api/ai/roadmap", &[("x-user-id", "u_x"), ("x-user-email", email.as_str()), ("x-real-ip", "10.9.9.9")]),
            )
            .await;
            if res.status() == StatusCode::OK {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 2);
        assert_eq!(state.policies.limiter(PolicyClass::Ai).current_count("10.9.9.9"), Some(20));
        assert_eq!(state.policies.limiter(PolicyClass::Ai).current_count("caller0@example.com"), None);
    }

    #[tokio::test]
    async fn test_upstream_redirect_is_relayed() {
        let upstream = MockServer::start().await;
        Mock::given(http_method("GET"))
            .and(path("/api/bookings/x"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/api/landing"))
            .expect(1)
            .mount(&upstream)
            .await;
        Mock::given(http_method("GET"))
            .and(path("/api/landing"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&upstream)
            .await;
        let state = test_state(&upstream.uri());

        let req = Request::builder().uri("/api/bookings/x").body(Body::empty()).unwrap();
        let res = send(&state, req).await;

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()["location"], "/api/landing");
    }
}
