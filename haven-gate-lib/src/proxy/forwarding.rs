use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Request, Response, Version};
use http_body_util::{combinators::BoxBody, BodyExt};
use hyper::body::Incoming;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::proxy::client_pool::ClientPool;
use crate::proxy::http_result::{HttpError, HttpResult};
use crate::security::AuthToken;
use crate::telemetry::Metrics;

type RespBody = BoxBody<bytes::Bytes, hyper::Error>;

pub mod names {
    pub const FORWARDED_FOR: &str = "x-forwarded-for";
    pub const FORWARDED_HOST: &str = "x-forwarded-host";
    pub const FORWARDED_PROTO: &str = "x-forwarded-proto";
    /// Subject of the verified token, set by the gate only
    pub const USER_ID: &str = "x-haven-user-id";
    /// Role of the verified token, set by the gate only
    pub const USER_ROLE: &str = "x-haven-user-role";
}

/// Where and how an admitted request is sent
pub struct ForwardTarget<'a> {
    /// Upstream `host:port`
    pub upstream: &'a str,
    pub timeout: Duration,
    /// Route label for metrics
    pub route: &'a str,
    pub metrics: Option<&'a Arc<Metrics>>,
}

/// Rewrite request headers for the upstream
///
/// 1. Appends the peer IP to `X-Forwarded-For` (or creates it)
/// 2. Sets `X-Forwarded-Host` from `Host`
/// 3. Keeps an inbound `X-Forwarded-Proto`, otherwise sets "http"
/// 4. Drops client-supplied identity headers and sets them from the verified
///    token, if any
pub fn prepare_upstream_headers(
    headers: &mut HeaderMap,
    peer: SocketAddr,
    principal: Option<&AuthToken>,
) {
    let client_ip = peer.ip().to_string();
    let forwarded_for = match headers.get(names::FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {client_ip}"),
        None => client_ip,
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert(HeaderName::from_static(names::FORWARDED_FOR), value);
    }

    if let Some(host) = headers.get(http::header::HOST).cloned() {
        headers.insert(HeaderName::from_static(names::FORWARDED_HOST), host);
    }

    if !headers.contains_key(names::FORWARDED_PROTO) {
        headers.insert(
            HeaderName::from_static(names::FORWARDED_PROTO),
            HeaderValue::from_static("http"),
        );
    }

    headers.remove(names::USER_ID);
    headers.remove(names::USER_ROLE);
    if let Some(claims) = principal {
        if let Ok(subject) = HeaderValue::from_str(&claims.subject) {
            headers.insert(HeaderName::from_static(names::USER_ID), subject);
        }
        headers.insert(
            HeaderName::from_static(names::USER_ROLE),
            HeaderValue::from_static(claims.role.as_str()),
        );
    }
}

/// Send an admitted request to the upstream. The handler has already
/// canonicalized the path; path and query are sent as they are.
pub async fn forward(
    req: Request<Incoming>,
    pool: &ClientPool,
    target: ForwardTarget<'_>,
) -> HttpResult<Response<RespBody>> {
    let start = Instant::now();

    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let uri = format!("http://{}{}", target.upstream, path_and_query)
        .parse::<http::Uri>()
        .map_err(|e| HttpError::InvalidUri(e.to_string()))?;

    let (mut parts, body) = req.into_parts();
    parts.uri = uri;
    // the pooled client speaks HTTP/1.1 to the upstream
    parts.version = Version::HTTP_11;
    let out_req = Request::from_parts(parts, body);

    let result = tokio::time::timeout(target.timeout, pool.client().request(out_req)).await;
    let duration = start.elapsed().as_secs_f64();

    let error = match result {
        Ok(Ok(resp)) => {
            let status_code = resp.status().as_u16();
            if let Some(m) = target.metrics {
                m.record_upstream_request(target.upstream, status_code, target.route);
                m.record_upstream_duration(duration, target.upstream, status_code, target.route);
            }
            return Ok(resp.map(|b| b.boxed()));
        }
        Ok(Err(e)) => HttpError::UpstreamUnreachable(e.to_string()),
        Err(_) => HttpError::UpstreamTimeout(target.timeout.as_millis() as u64),
    };

    debug!(upstream = target.upstream, error = %error, "Upstream request failed");
    if let Some(m) = target.metrics {
        m.record_upstream_error(target.upstream, error.error_type(), target.route);
    }
    Err(error)
}
