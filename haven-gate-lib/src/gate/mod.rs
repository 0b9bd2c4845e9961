//! The request gate.
//!
//! Every request runs the same linear pipeline, stopping at the first stage
//! that rejects it:
//!
//! ```text
//! Screening -> RateCheck -> AuthCheck -> (forward to upstream)
//!    400         429/503      401/403
//! ```
//!
//! Each stage is a plain function over the request and the gate's state. The
//! only side effect is the window update made by the rate stage; a later
//! auth rejection does not roll it back.

mod path;
mod rejection;
mod response;
mod route;

pub use path::{canonical_path, canonicalize_uri};
pub use rejection::Rejection;
pub use response::{
    apply_rate_limit_headers, json_error, rejection_response, ErrorBody, X_RATELIMIT_LIMIT,
    X_RATELIMIT_REMAINING, X_RATELIMIT_RESET,
};
pub use route::{RouteMatch, RouteTable};

use http::{HeaderMap, Method, Request};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::config::{Config, FailurePolicy, RouteAccess};
use crate::security::rate_limit::{
    extract_rate_limit_key, Clock, FixedWindowLimiter, InMemoryWindowStore, RateDecision,
    RateLimitManager, SystemClock, WindowStore,
};
use crate::security::{
    extract_token, screen_query, AuthError, AuthToken, Role, StaticTokenVerifier, TokenVerifier,
};
use crate::telemetry::Metrics;

/// The parts of an inbound request the gate looks at
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    /// Raw, still percent-encoded query string
    pub query: Option<&'a str>,
    pub headers: &'a HeaderMap,
    /// Socket peer address, when known
    pub peer: Option<IpAddr>,
}

impl<'a> GateRequest<'a> {
    pub fn from_request<B>(req: &'a Request<B>, peer: Option<IpAddr>) -> Self {
        Self {
            method: req.method(),
            path: req.uri().path(),
            query: req.uri().query(),
            headers: req.headers(),
            peer,
        }
    }
}

/// A request that passed every stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub route: RouteMatch,
    /// Rate decision to report in response headers (`None` when no policy
    /// applied or the store failed open)
    pub rate: Option<RateDecision>,
    /// Verified token claims on protected routes
    pub principal: Option<AuthToken>,
}

pub struct Gate {
    routes: RouteTable,
    screening_enabled: bool,
    rate_limits: RateLimitManager,
    verifier: Arc<dyn TokenVerifier>,
    cookie_name: String,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<Metrics>>,
}

impl Gate {
    /// Build a gate over explicit collaborators.
    pub fn new(
        config: &Config,
        store: Arc<dyn WindowStore>,
        clock: Arc<dyn Clock>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        let limiter = Arc::new(FixedWindowLimiter::new(store, clock.clone()));
        Self {
            routes: RouteTable::new(&config.routes),
            screening_enabled: config.security.screening.enabled,
            rate_limits: RateLimitManager::new(limiter, &config.security.rate_limit, &config.routes),
            verifier,
            cookie_name: config.security.auth.cookie_name.clone(),
            clock,
            metrics: None,
        }
    }

    /// Gate with an in-memory window store, the system clock and the tokens
    /// listed in `[security.auth]`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryWindowStore::new()),
            Arc::new(SystemClock),
            Arc::new(StaticTokenVerifier::new(&config.security.auth.tokens)),
        )
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Limiter shared by every request, also driven by the sweeper
    pub fn limiter(&self) -> &Arc<FixedWindowLimiter> {
        self.rate_limits.limiter()
    }

    pub fn route_for(&self, path: &str) -> RouteMatch {
        self.routes.pick(&canonical_path(path))
    }

    /// Run the pipeline for one request.
    ///
    /// Routes are resolved on the canonical path. Callers that forward the
    /// request should send that same path upstream (see [`canonicalize_uri`]).
    pub fn evaluate(&self, req: &GateRequest<'_>) -> Result<Admission, Rejection> {
        let route = self.route_for(req.path);

        match self.run_stages(req, &route) {
            Ok((rate, principal)) => Ok(Admission { route, rate, principal }),
            Err(rejection) => {
                debug!(
                    method = %req.method,
                    path = req.path,
                    route = route.label(),
                    reason = rejection.reason(),
                    status = rejection.status().as_u16(),
                    "Gate rejected request"
                );
                if let Some(m) = &self.metrics {
                    m.record_gate_rejection(rejection.reason(), route.label());
                }
                Err(rejection)
            }
        }
    }

    fn run_stages(
        &self,
        req: &GateRequest<'_>,
        route: &RouteMatch,
    ) -> Result<(Option<RateDecision>, Option<AuthToken>), Rejection> {
        self.screen(req)?;
        let rate = self.check_rate(req, route)?;
        let principal = self.check_access(req, route)?;
        Ok((rate, principal))
    }

    fn screen(&self, req: &GateRequest<'_>) -> Result<(), Rejection> {
        if !self.screening_enabled {
            return Ok(());
        }
        screen_query(req.query).map_err(|hit| {
            warn!(param = %hit.param, threat = %hit.kind, path = req.path, "Suspicious query parameter");
            Rejection::InputRejected(hit)
        })
    }

    fn check_rate(
        &self,
        req: &GateRequest<'_>,
        route: &RouteMatch,
    ) -> Result<Option<RateDecision>, Rejection> {
        let client_key = extract_rate_limit_key(req.headers, req.peer);
        let label = route.label();

        let scoped = match self.rate_limits.check(&client_key, route.prefix.as_deref()) {
            Ok(Some(scoped)) => scoped,
            Ok(None) => return Ok(None),
            Err(e) => {
                if let Some(m) = &self.metrics {
                    m.record_rate_limit_store_error();
                }
                return match self.rate_limits.failure_policy() {
                    FailurePolicy::Closed => {
                        error!(error = %e, route = label, "Rate limit store failed, rejecting request");
                        Err(Rejection::Unavailable)
                    }
                    FailurePolicy::Open => {
                        warn!(error = %e, route = label, "Rate limit store failed, letting request through");
                        Ok(None)
                    }
                };
            }
        };

        if let Some(m) = &self.metrics {
            m.record_rate_limit_request(label);
        }

        let decision = scoped.decision;
        if !decision.allowed {
            if let Some(m) = &self.metrics {
                m.record_rate_limit_rejection(label);
            }
            return Err(Rejection::RateLimited { decision, message: scoped.policy.message.clone() });
        }

        if let Some(m) = &self.metrics {
            m.record_rate_limit_allowed(label);
        }
        debug!(limit = decision.limit, remaining = decision.remaining, "Rate limit check passed");
        Ok(Some(decision))
    }

    fn check_access(
        &self,
        req: &GateRequest<'_>,
        route: &RouteMatch,
    ) -> Result<Option<AuthToken>, Rejection> {
        if route.access == RouteAccess::Public {
            return Ok(None);
        }

        let kind = route.kind;
        let token = extract_token(req.headers, &self.cookie_name)
            .ok_or(Rejection::Unauthenticated { kind, cause: AuthError::Missing })?;
        let claims = self
            .verifier
            .verify(token, self.clock.now_secs())
            .map_err(|cause| Rejection::Unauthenticated { kind, cause })?;

        if route.access == RouteAccess::Admin && claims.role != Role::Admin {
            return Err(Rejection::Unauthorized { kind, role: claims.role });
        }

        Ok(Some(claims))
    }
}
