//! End-to-end tests: a client talks to the gate, which forwards to an
//! in-process upstream that echoes what it received.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use haven_gate_lib::config::{parse_config, Config};
use haven_gate_lib::proxy::{serve, ServerContext};
use haven_gate_lib::security::StaticTokenVerifier;
use haven_gate_lib::Gate;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const TOKEN: &str = "e2e-user-token";

/// Upstream that answers every request with a JSON echo of its path and the
/// identity headers it saw.
async fn spawn_echo_upstream() -> Result<SocketAddr, Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let svc = service_fn(|req: Request<Incoming>| async move {
                    let header = |name: &str| {
                        req.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
                    };
                    let body = json!({
                        "path": req.uri().path(),
                        "query": req.uri().query(),
                        "userId": header("x-haven-user-id"),
                        "role": header("x-haven-user-role"),
                        "forwardedFor": header("x-forwarded-for"),
                    });
                    let resp = Response::builder()
                        .header("content-type", "application/json")
                        .body(Full::new(Bytes::from(body.to_string())))
                        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())));
                    Ok::<_, Infallible>(resp)
                });
                let _ = ConnBuilder::new(TokioExecutor::new())
                    .serve_connection(TokioIo::new(stream), svc)
                    .await;
            });
        }
    });

    Ok(addr)
}

fn gate_config(upstream: &str) -> Result<Config, Box<dyn std::error::Error + Send + Sync>> {
    let digest = StaticTokenVerifier::digest(TOKEN);
    let cfg = parse_config(&format!(
        r#"
listen = "127.0.0.1:0"

[upstream]
address = "{upstream}"

[timeout]
connect_ms = 500
upstream_ms = 2000
shutdown_secs = 1

[security.rate_limit]
limit = 3
window_ms = 60000

[[security.auth.tokens]]
sha256 = "{digest}"
subject = "client-42"
role = "user"
expires_at = 4102444800

[[security.headers.custom]]
name = "x-content-type-options"
value = "nosniff"

[[routes]]
prefix = "/api/sessions"
access = "protected"

[[routes]]
prefix = "/dashboard"
kind = "page"
access = "protected"

[[routes]]
prefix = "/api/health"
rate_limit = {{ enabled = false }}
"#
    ))?;
    Ok(cfg)
}

struct RunningGate {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<haven_gate_lib::Result<()>>,
}

impl RunningGate {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(self) -> TestResult {
        self.shutdown.cancel();
        self.handle.await??;
        Ok(())
    }
}

async fn start_gate(cfg: Config) -> Result<RunningGate, Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let gate = Gate::from_config(&cfg);
    let ctx = Arc::new(ServerContext::new(Arc::new(cfg), gate, None));
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(serve(listener, ctx, shutdown.clone()));
    Ok(RunningGate { addr, shutdown, handle })
}

fn client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

#[tokio::test]
async fn test_admitted_request_reaches_upstream() -> TestResult {
    let upstream = spawn_echo_upstream().await?;
    let gate = start_gate(gate_config(&upstream.to_string())?).await?;

    let resp = client()?
        .get(gate.url("/api/therapists?specialty=cbt"))
        .header("x-haven-user-role", "admin")
        .send()
        .await?;

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let h = resp.headers();
    assert_eq!(h.get("x-ratelimit-limit").map(|v| v.as_bytes()), Some(&b"3"[..]));
    assert_eq!(h.get("x-ratelimit-remaining").map(|v| v.as_bytes()), Some(&b"2"[..]));
    assert!(h.contains_key("x-ratelimit-reset"));
    assert_eq!(h.get("x-content-type-options").map(|v| v.as_bytes()), Some(&b"nosniff"[..]));

    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["path"], "/api/therapists");
    assert_eq!(body["query"], "specialty=cbt");
    // client-supplied identity headers never reach the upstream
    assert_eq!(body["role"], serde_json::Value::Null);
    assert_eq!(body["forwardedFor"], "127.0.0.1");

    gate.stop().await
}

#[tokio::test]
async fn test_protected_route_forwards_identity() -> TestResult {
    let upstream = spawn_echo_upstream().await?;
    let gate = start_gate(gate_config(&upstream.to_string())?).await?;
    let client = client()?;

    let resp = client.get(gate.url("/api/sessions")).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["error"], "Unauthorized");
    assert_eq!(body["message"], "Authentication required");

    let resp = client.get(gate.url("/api/sessions/7")).bearer_auth(TOKEN).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["userId"], "client-42");
    assert_eq!(body["role"], "user");

    gate.stop().await
}

#[tokio::test]
async fn test_upstream_sees_canonical_path() -> TestResult {
    let upstream = spawn_echo_upstream().await?;
    let gate = start_gate(gate_config(&upstream.to_string())?).await?;
    let client = client()?;

    let resp = client.get(gate.url("/api//%73essions/7?page=2")).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

    let resp = client
        .get(gate.url("/api//%73essions/7?page=2"))
        .bearer_auth(TOKEN)
        .send()
        .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["path"], "/api/sessions/7");
    assert_eq!(body["query"], "page=2");

    gate.stop().await
}

#[tokio::test]
async fn test_page_route_redirects_to_login() -> TestResult {
    let upstream = spawn_echo_upstream().await?;
    let gate = start_gate(gate_config(&upstream.to_string())?).await?;
    let client = client()?;

    let resp = client.get(gate.url("/dashboard")).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::FOUND);
    assert_eq!(resp.headers().get("location").map(|v| v.as_bytes()), Some(&b"/login"[..]));

    let resp = client
        .get(gate.url("/dashboard"))
        .header("cookie", format!("token={TOKEN}"))
        .send()
        .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    gate.stop().await
}

#[tokio::test]
async fn test_fourth_request_is_rate_limited() -> TestResult {
    let upstream = spawn_echo_upstream().await?;
    let gate = start_gate(gate_config(&upstream.to_string())?).await?;
    let client = client()?;

    for expected_remaining in ["2", "1", "0"] {
        let resp = client.get(gate.url("/api/therapists")).send().await?;
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(
            resp.headers().get("x-ratelimit-remaining").and_then(|v| v.to_str().ok()),
            Some(expected_remaining)
        );
    }

    let resp = client.get(gate.url("/api/therapists")).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = resp
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .ok_or("retry-after missing")?
        .parse()?;
    assert!((1..=60).contains(&retry_after));
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["error"], "Too Many Requests");
    assert_eq!(body["retryAfter"], retry_after);

    // a route with limiting switched off is unaffected
    let resp = client.get(gate.url("/api/health")).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert!(!resp.headers().contains_key("x-ratelimit-limit"));

    gate.stop().await
}

#[tokio::test]
async fn test_screened_request_never_reaches_upstream() -> TestResult {
    let upstream = spawn_echo_upstream().await?;
    let gate = start_gate(gate_config(&upstream.to_string())?).await?;

    let resp = client()?
        .get(gate.url("/api/therapists?file=..%2F..%2Fetc%2Fpasswd"))
        .send()
        .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["error"], "Bad Request");

    gate.stop().await
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() -> TestResult {
    // grab a free port and release it so nothing is listening there
    let closed = TcpListener::bind("127.0.0.1:0").await?.local_addr()?;
    let gate = start_gate(gate_config(&closed.to_string())?).await?;

    let resp = client()?.get(gate.url("/api/therapists")).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_GATEWAY);
    // the request was still counted
    assert_eq!(
        resp.headers().get("x-ratelimit-remaining").map(|v| v.as_bytes()),
        Some(&b"2"[..])
    );

    gate.stop().await
}
