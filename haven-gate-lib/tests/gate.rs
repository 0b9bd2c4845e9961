use std::sync::Arc;

use haven_gate_lib::config::{parse_config, Config, RouteAccess, RouteKind};
use haven_gate_lib::gate::{rejection_response, Admission, Gate, GateRequest, Rejection};
use haven_gate_lib::security::rate_limit::{InMemoryWindowStore, ManualClock};
use haven_gate_lib::security::{AuthError, StaticTokenVerifier, ThreatKind};
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use http_body_util::BodyExt;

// 2023-11-14T22:13:20Z
const NOW_MS: u64 = 1_700_000_000_000;

fn config() -> Result<Config, Box<dyn std::error::Error + Send + Sync>> {
    let therapist = StaticTokenVerifier::digest("therapist-token");
    let expired = StaticTokenVerifier::digest("expired-token");
    let cfg = parse_config(&format!(
        r#"
listen = "127.0.0.1:0"

[upstream]
address = "127.0.0.1:3000"

[redirects]
login = "/signin"
dashboard = "/home"

[security.rate_limit]
limit = 100
window_ms = 60000

[security.auth]
cookie_name = "haven_session"

[[security.auth.tokens]]
sha256 = "{therapist}"
subject = "t-1"
role = "therapist"
expires_at = 1800000000

[[security.auth.tokens]]
sha256 = "{expired}"
subject = "u-9"
role = "user"
expires_at = 1600000000

[[routes]]
prefix = "/api/auth/login"
rate_limit = {{ limit = 2, message = "Too many login attempts" }}

[[routes]]
prefix = "/admin/"
kind = "page"
access = "admin"

[[routes]]
prefix = "/dashboard"
kind = "page"
access = "protected"

[[routes]]
prefix = "/api/sessions"
access = "protected"
"#
    ))?;
    Ok(cfg)
}

fn gate(cfg: &Config) -> (Gate, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(NOW_MS));
    let gate = Gate::new(
        cfg,
        Arc::new(InMemoryWindowStore::new()),
        clock.clone(),
        Arc::new(StaticTokenVerifier::new(&cfg.security.auth.tokens)),
    );
    (gate, clock)
}

fn eval(gate: &Gate, uri: &str, headers: &HeaderMap) -> Result<Admission, Rejection> {
    let uri: http::Uri = uri.parse().expect("uri");
    gate.evaluate(&GateRequest {
        method: &Method::GET,
        path: uri.path(),
        query: uri.query(),
        headers,
        peer: Some("192.0.2.44".parse().expect("ip")),
    })
}

fn cookie(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_str(value).expect("cookie"));
    headers
}

#[test]
fn test_route_resolution() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cfg = config()?;
    let (gate, _clock) = gate(&cfg);

    let dashboard = gate.route_for("/dashboard/sessions");
    assert_eq!(dashboard.prefix.as_deref(), Some("/dashboard"));
    assert_eq!(dashboard.access, RouteAccess::Protected);

    // segment boundary
    let other = gate.route_for("/dashboards");
    assert_eq!(other.prefix, None);
    assert_eq!(other.access, RouteAccess::Public);
    assert_eq!(other.kind, RouteKind::Page);

    let api = gate.route_for("/api/therapists");
    assert_eq!(api.prefix, None);
    assert_eq!(api.kind, RouteKind::Api);

    // "/admin/" only covers what is below it
    assert_eq!(gate.route_for("/admin/reports").prefix.as_deref(), Some("/admin/"));
    assert_eq!(gate.route_for("/admin").prefix, None);
    Ok(())
}

#[test]
fn test_path_variants_cannot_skip_access_checks() -> Result<(), Box<dyn std::error::Error + Send + Sync>>
{
    let cfg = config()?;
    let (gate, _clock) = gate(&cfg);
    let anonymous = HeaderMap::new();

    for path in [
        "/api//sessions",
        "/api/%73essions/7",
        "/API/Sessions",
        "/api/public/../sessions",
        "/api/./sessions/7",
        "/api/%2e%2e/api/sessions",
    ] {
        let rejection = eval(&gate, path, &anonymous).err().ok_or(format!("{path} admitted"))?;
        assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED, "{path}");
    }

    let therapist = cookie("haven_session=therapist-token");
    let rejection = eval(&gate, "/Admin//reports", &therapist)
        .err()
        .ok_or("therapist admitted to admin page")?;
    assert_eq!(rejection.status(), StatusCode::FOUND);

    assert_eq!(gate.route_for("/api//%73essions").prefix.as_deref(), Some("/api/sessions"));
    Ok(())
}

#[test]
fn test_path_variants_share_the_login_limit() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cfg = config()?;
    let (gate, _clock) = gate(&cfg);
    let headers = HeaderMap::new();

    assert!(eval(&gate, "/api/auth/login", &headers).is_ok());
    assert!(eval(&gate, "/api//auth/login", &headers).is_ok());

    for path in ["/API/Auth/Login", "/api/auth/%6Cogin", "/api/x/../auth/login"] {
        let rejection = eval(&gate, path, &headers).err().ok_or(format!("{path} admitted"))?;
        assert_eq!(rejection.status(), StatusCode::TOO_MANY_REQUESTS, "{path}");
    }
    Ok(())
}

#[test]
fn test_cookie_token_admits_page() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cfg = config()?;
    let (gate, _clock) = gate(&cfg);

    let admitted = eval(&gate, "/dashboard", &cookie("theme=dark; haven_session=therapist-token"))
        .map_err(|r| format!("unexpected rejection: {r:?}"))?;
    let principal = admitted.principal.ok_or("principal missing")?;
    assert_eq!(principal.subject, "t-1");
    assert_eq!(principal.role.as_str(), "therapist");
    Ok(())
}

#[test]
fn test_token_expires_with_the_clock() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cfg = config()?;
    let (gate, clock) = gate(&cfg);

    let rejection = eval(&gate, "/api/sessions", &cookie("haven_session=expired-token"))
        .err()
        .ok_or("expired token admitted")?;
    assert_eq!(
        rejection,
        Rejection::Unauthenticated { kind: RouteKind::Api, cause: AuthError::Expired }
    );

    let headers = cookie("haven_session=therapist-token");
    assert!(eval(&gate, "/api/sessions", &headers).is_ok());
    clock.set(1_800_000_000_000);
    assert!(eval(&gate, "/api/sessions", &headers).is_err());
    Ok(())
}

#[tokio::test]
async fn test_page_rejections_redirect() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cfg = config()?;
    let (gate, _clock) = gate(&cfg);

    let anonymous = eval(&gate, "/dashboard", &HeaderMap::new())
        .err()
        .ok_or("anonymous admitted")?;
    let resp = rejection_response(&anonymous, &cfg.redirects)?;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers().get(header::LOCATION).map(|v| v.as_bytes()), Some(&b"/signin"[..]));

    let therapist = eval(&gate, "/admin/reports", &cookie("haven_session=therapist-token"))
        .err()
        .ok_or("therapist admitted to admin page")?;
    let resp = rejection_response(&therapist, &cfg.redirects)?;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers().get(header::LOCATION).map(|v| v.as_bytes()), Some(&b"/home"[..]));
    Ok(())
}

#[tokio::test]
async fn test_screening_rejection_body() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cfg = config()?;
    let (gate, _clock) = gate(&cfg);

    let rejection = eval(&gate, "/api/therapists?name=%3Cscript%3Ealert(1)%3C%2Fscript%3E", &HeaderMap::new())
        .err()
        .ok_or("script admitted")?;
    match &rejection {
        Rejection::InputRejected(hit) => {
            assert_eq!(hit.param, "name");
            assert_eq!(hit.kind, ThreatKind::ScriptInjection);
        }
        other => return Err(format!("unexpected rejection: {other:?}").into()),
    }

    let resp = rejection_response(&rejection, &cfg.redirects)?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = resp.into_body().collect().await?.to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(json["error"], "Bad Request");
    assert_eq!(json["message"], "Invalid characters in request parameters");
    Ok(())
}

#[tokio::test]
async fn test_login_limit_and_window_reset() -> Result<(), Box<dyn std::error::Error + Send + Sync>>
{
    let cfg = config()?;
    let (gate, clock) = gate(&cfg);
    let headers = HeaderMap::new();

    assert!(eval(&gate, "/api/auth/login", &headers).is_ok());
    clock.advance(20_000);
    assert!(eval(&gate, "/api/auth/login", &headers).is_ok());
    clock.advance(10_000);

    let rejection = eval(&gate, "/api/auth/login", &headers).err().ok_or("third login admitted")?;
    assert_eq!(rejection.retry_after(), Some(30));

    let resp = rejection_response(&rejection, &cfg.redirects)?;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers().get(header::RETRY_AFTER).map(|v| v.as_bytes()), Some(&b"30"[..]));
    assert_eq!(resp.headers().get("x-ratelimit-limit").map(|v| v.as_bytes()), Some(&b"2"[..]));
    assert_eq!(resp.headers().get("x-ratelimit-remaining").map(|v| v.as_bytes()), Some(&b"0"[..]));
    let body = resp.into_body().collect().await?.to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(json["message"], "Too many login attempts");
    assert_eq!(json["retryAfter"], 30);

    // other API routes keep their own budget
    let admitted = eval(&gate, "/api/therapists", &headers)
        .map_err(|r| format!("unexpected rejection: {r:?}"))?;
    assert_eq!(admitted.rate.map(|d| d.remaining), Some(99));

    clock.advance(30_000);
    assert!(eval(&gate, "/api/auth/login", &headers).is_ok());
    Ok(())
}
