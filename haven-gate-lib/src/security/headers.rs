use crate::config::{HstsConfig, SecurityHeaders};
use http::{HeaderMap, HeaderName, HeaderValue};

/// Whether the client reached the load balancer over HTTPS.
///
/// The gate itself listens on plain HTTP behind a TLS-terminating balancer,
/// so this relies on `X-Forwarded-Proto`.
pub fn is_https_request(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

/// Apply security headers to an outgoing response (gate rejection or
/// forwarded upstream response)
///
/// Headers are applied in the following order:
/// 1. Custom headers (user-defined)
/// 2. HSTS (if enabled and the client connection is HTTPS)
/// 3. CSP (if enabled)
///
/// Entries whose name or value is not a valid header are skipped.
/// Returns the number of headers written.
pub fn apply_security_headers(
    headers: &mut HeaderMap,
    config: &SecurityHeaders,
    is_https: bool,
) -> usize {
    let mut written = 0;

    for header in &config.custom {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(header.name.as_bytes()),
            HeaderValue::from_str(&header.value),
        ) {
            headers.insert(name, value);
            written += 1;
        }
    }

    if is_https && config.hsts.enabled {
        if let Ok(hsts_value) = build_hsts_header(&config.hsts) {
            headers.insert(http::header::STRICT_TRANSPORT_SECURITY, hsts_value);
            written += 1;
        }
    }

    if config.csp.enabled {
        if let Ok(csp_value) = HeaderValue::from_str(&config.csp.policy) {
            headers.insert(http::header::CONTENT_SECURITY_POLICY, csp_value);
            written += 1;
        }
    }

    written
}

fn build_hsts_header(hsts: &HstsConfig) -> Result<HeaderValue, http::header::InvalidHeaderValue> {
    let mut parts = vec![format!("max-age={}", hsts.max_age)];

    if hsts.include_subdomains {
        parts.push("includeSubDomains".to_string());
    }

    if hsts.preload {
        parts.push("preload".to_string());
    }

    HeaderValue::from_str(&parts.join("; "))
}
