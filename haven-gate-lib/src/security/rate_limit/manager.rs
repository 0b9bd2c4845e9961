use ahash::AHashMap;
use http::HeaderMap;
use std::net::IpAddr;
use std::sync::Arc;

use super::{FixedWindowLimiter, LimitPolicy, RateDecision, StoreError};
use crate::config::{FailurePolicy, RateLimitConfig, RouteConfig};

/// Key used when no client address can be determined
pub const UNKNOWN_CLIENT_KEY: &str = "unknown";

const GLOBAL_SCOPE: &str = "*";

/// Policy lookup for the rate stage (global and per-route)
///
/// Routes without a `rate_limit` table fall back to the global policy and share
/// its counters. Routes with their own table get their own counters, keyed
/// under the route prefix, so a tight login limit does not eat into the
/// general API budget.
pub struct RateLimitManager {
    limiter: Arc<FixedWindowLimiter>,
    /// Global policy (`None` when disabled)
    global: Option<LimitPolicy>,
    /// Per-route overrides; `None` marks a route with limiting switched off
    route_policies: AHashMap<String, Option<LimitPolicy>>,
    failure_policy: FailurePolicy,
}

/// A limiter decision together with the policy it was taken under
#[derive(Debug, Clone, Copy)]
pub struct ScopedDecision<'a> {
    pub decision: RateDecision,
    pub policy: &'a LimitPolicy,
}

impl RateLimitManager {
    /// Create a new rate limit manager from configuration
    ///
    /// # Arguments
    /// * `limiter` - Shared fixed-window limiter (owns the store and clock)
    /// * `global_config` - Global rate limiting configuration
    /// * `routes` - Route configurations (with optional per-route rate limits)
    pub fn new(
        limiter: Arc<FixedWindowLimiter>,
        global_config: &RateLimitConfig,
        routes: &[RouteConfig],
    ) -> Self {
        let route_policies = routes
            .iter()
            .filter_map(|route| {
                route.rate_limit.as_ref().map(|override_cfg| {
                    (route.prefix.clone(), LimitPolicy::for_route(global_config, override_cfg))
                })
            })
            .collect();

        Self {
            limiter,
            global: LimitPolicy::from_global(global_config),
            route_policies,
            failure_policy: global_config.failure_policy,
        }
    }

    /// Policy that applies to a matched route prefix (or to unmatched paths)
    pub fn policy_for(&self, route_prefix: Option<&str>) -> Option<(&str, &LimitPolicy)> {
        if let Some(prefix) = route_prefix {
            if let Some((key, policy)) = self.route_policies.get_key_value(prefix) {
                return policy.as_ref().map(|p| (key.as_str(), p));
            }
        }
        self.global.as_ref().map(|p| (GLOBAL_SCOPE, p))
    }

    /// Count one request for `client_key` against the applicable policy
    ///
    /// # Returns
    /// * `Ok(None)` if no policy applies to the route
    /// * `Ok(Some(_))` with the limiter decision, allowed or not
    /// * `Err(_)` if the window store failed; see [`Self::failure_policy`]
    pub fn check(
        &self,
        client_key: &str,
        route_prefix: Option<&str>,
    ) -> Result<Option<ScopedDecision<'_>>, StoreError> {
        let Some((scope, policy)) = self.policy_for(route_prefix) else {
            return Ok(None);
        };

        let key = format!("{scope}|{client_key}");
        let decision = self.limiter.decide(&key, policy)?;
        Ok(Some(ScopedDecision { decision, policy }))
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn limiter(&self) -> &Arc<FixedWindowLimiter> {
        &self.limiter
    }

    pub fn is_enabled(&self) -> bool {
        self.global.is_some() || self.route_policies.values().any(Option::is_some)
    }
}

/// Derive the client key used for rate limiting
///
/// Prefers the first hop of `X-Forwarded-For`, then `X-Real-IP`, then the
/// socket peer address. Falls back to [`UNKNOWN_CLIENT_KEY`], which makes all
/// unidentifiable clients share one window.
pub fn extract_rate_limit_key(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    match peer {
        Some(ip) => ip.to_string(),
        None => UNKNOWN_CLIENT_KEY.to_string(),
    }
}
