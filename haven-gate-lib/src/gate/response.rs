use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, LOCATION, RETRY_AFTER};
use http::{HeaderMap, Response};
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use serde::Serialize;

use super::Rejection;
use crate::config::{RedirectConfig, RouteKind};
use crate::error::{GateError, Result};
use crate::security::rate_limit::RateDecision;
use crate::security::AuthError;

type RespBody = BoxBody<Bytes, hyper::Error>;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// JSON body of a gate rejection
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody<'a> {
    pub error: &'a str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// Attach `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset`
/// (Unix seconds). Existing values from upstream are replaced.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at_secs()));
}

/// Build a JSON error response.
pub fn json_error(
    status: http::StatusCode,
    error: &str,
    message: &str,
    retry_after: Option<u64>,
) -> Result<Response<RespBody>> {
    let body = serde_json::to_vec(&ErrorBody { error, message, retry_after })
        .map_err(|e| GateError::Http(format!("Failed to serialize error body: {e}")))?;

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(full(body))
        .map_err(|e| GateError::Http(format!("Failed to build error response: {e}")))
}

fn redirect(location: &str) -> Result<Response<RespBody>> {
    Response::builder()
        .status(http::StatusCode::FOUND)
        .header(LOCATION, location)
        .body(full(Vec::new()))
        .map_err(|e| GateError::Http(format!("Failed to build redirect response: {e}")))
}

fn full(bytes: Vec<u8>) -> RespBody {
    Full::new(Bytes::from(bytes))
        .map_err(|never| match never {})
        .boxed()
}

/// Response sent to the client for a gate rejection.
pub fn rejection_response(
    rejection: &Rejection,
    redirects: &RedirectConfig,
) -> Result<Response<RespBody>> {
    let status = rejection.status();
    match rejection {
        Rejection::InputRejected(_) => {
            json_error(status, "Bad Request", "Invalid characters in request parameters", None)
        }
        Rejection::RateLimited { decision, message } => {
            let retry_after = decision.retry_after_secs();
            let mut resp = json_error(status, "Too Many Requests", message, Some(retry_after))?;
            let headers = resp.headers_mut();
            headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));
            apply_rate_limit_headers(headers, decision);
            Ok(resp)
        }
        Rejection::Unauthenticated { kind: RouteKind::Page, .. } => {
            redirect(&redirects.login)
        }
        Rejection::Unauthenticated { cause, .. } => {
            let message = match cause {
                AuthError::Missing => "Authentication required",
                _ => "Invalid or expired token",
            };
            json_error(status, "Unauthorized", message, None)
        }
        Rejection::Unauthorized { kind: RouteKind::Page, .. } => {
            redirect(&redirects.dashboard)
        }
        Rejection::Unauthorized { .. } => {
            json_error(status, "Forbidden", "Admin access required", None)
        }
        Rejection::Unavailable => json_error(
            status,
            "Service Unavailable",
            "Request could not be checked, please try again later.",
            None,
        ),
    }
}
