use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::gate::{apply_rate_limit_headers, canonicalize_uri, rejection_response, GateRequest};
use crate::proxy::context::ServerContext;
use crate::proxy::forwarding::{forward, prepare_upstream_headers, ForwardTarget};
use crate::proxy::synthetic_response::{status_only, synthetic_error_response};
use crate::security::{apply_security_headers, is_https_request};

type RespBody = BoxBody<Bytes, hyper::Error>;

/// Gate one request and, if admitted, forward it to the upstream
pub async fn handle_request(
    mut req: Request<Incoming>,
    ctx: Arc<ServerContext>,
    peer: SocketAddr,
) -> Response<RespBody> {
    let start = Instant::now();
    let method = req.method().to_string();
    let protocol = format!("{:?}", req.version());
    let is_https = is_https_request(req.headers());

    // the upstream must see the path the gate matched routes against
    if let Some(uri) = canonicalize_uri(req.uri()) {
        debug!(original = %req.uri(), canonical = %uri, "Canonicalized request path");
        *req.uri_mut() = uri;
    }

    let outcome = ctx.gate.evaluate(&GateRequest::from_request(&req, Some(peer.ip())));

    let (mut resp, route) = match outcome {
        Err(rejection) => {
            let route = ctx.gate.route_for(req.uri().path());
            let resp = rejection_response(&rejection, &ctx.config.redirects).unwrap_or_else(|e| {
                error!(error = %e, "Failed to build rejection response");
                status_only(rejection.status())
            });
            (resp, route)
        }
        Ok(admission) => {
            prepare_upstream_headers(req.headers_mut(), peer, admission.principal.as_ref());

            let target = ForwardTarget {
                upstream: &ctx.config.upstream.address,
                timeout: ctx.upstream_timeout(),
                route: admission.route.label(),
                metrics: ctx.metrics.as_ref(),
            };
            let mut resp = match forward(req, &ctx.pool, target).await {
                Ok(resp) => resp,
                Err(e) => synthetic_error_response(&e),
            };
            if let Some(decision) = &admission.rate {
                apply_rate_limit_headers(resp.headers_mut(), decision);
            }
            (resp, admission.route)
        }
    };

    apply_security_headers(resp.headers_mut(), &ctx.config.security.headers, is_https);

    let status_code = resp.status().as_u16();
    let duration = start.elapsed().as_secs_f64();
    if let Some(m) = &ctx.metrics {
        m.record_request(&method, status_code, &protocol, route.label());
        m.record_request_duration(duration, &method, status_code, &protocol, route.label());
    }

    resp
}
