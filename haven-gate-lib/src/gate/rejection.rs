use http::StatusCode;

use crate::config::RouteKind;
use crate::security::rate_limit::RateDecision;
use crate::security::{AuthError, Role, ScreeningHit};

/// Why the gate terminated a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A query parameter matched a suspicious pattern (400)
    InputRejected(ScreeningHit),
    /// The client exhausted its window (429)
    RateLimited { decision: RateDecision, message: String },
    /// Missing, unknown or expired token (401, or redirect to login on pages)
    Unauthenticated { kind: RouteKind, cause: AuthError },
    /// Valid token without the admin role (403, or redirect to dashboard on pages)
    Unauthorized { kind: RouteKind, role: Role },
    /// The window store failed under the closed failure policy (503)
    Unavailable,
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::InputRejected(_) => StatusCode::BAD_REQUEST,
            Rejection::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Rejection::Unauthenticated { kind: RouteKind::Page, .. }
            | Rejection::Unauthorized { kind: RouteKind::Page, .. } => StatusCode::FOUND,
            Rejection::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Rejection::Unauthorized { .. } => StatusCode::FORBIDDEN,
            Rejection::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Metric and log label
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::InputRejected(_) => "input_rejected",
            Rejection::RateLimited { .. } => "rate_limited",
            Rejection::Unauthenticated { .. } => "unauthenticated",
            Rejection::Unauthorized { .. } => "unauthorized",
            Rejection::Unavailable => "unavailable",
        }
    }

    /// Seconds the client should wait, for rate-limit rejections
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Rejection::RateLimited { decision, .. } => Some(decision.retry_after_secs()),
            _ => None,
        }
    }
}
