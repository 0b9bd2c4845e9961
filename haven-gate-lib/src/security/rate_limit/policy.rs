use crate::config::{RateLimitConfig, RouteRateLimitConfig};

/// Limit applied to one rate-limited scope (the global default or a route).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitPolicy {
    /// Maximum requests admitted per window
    pub limit: u32,
    /// Window duration in milliseconds
    pub window_ms: u64,
    /// Message sent with 429 responses
    pub message: String,
}

impl LimitPolicy {
    pub fn new(limit: u32, window_ms: u64) -> Self {
        Self { limit, window_ms, message: RateLimitConfig::default().message }
    }

    /// Global policy, or `None` when rate limiting is disabled globally.
    pub fn from_global(config: &RateLimitConfig) -> Option<Self> {
        config.enabled.then(|| Self {
            limit: config.limit,
            window_ms: config.window_ms,
            message: config.message.clone(),
        })
    }

    /// Route policy with unset fields inherited from the global config.
    /// `None` when the route ends up disabled.
    pub fn for_route(global: &RateLimitConfig, route: &RouteRateLimitConfig) -> Option<Self> {
        let enabled = route.enabled.unwrap_or(global.enabled);
        enabled.then(|| Self {
            limit: route.limit.unwrap_or(global.limit),
            window_ms: route.window_ms.unwrap_or(global.window_ms),
            message: route.message.clone().unwrap_or_else(|| global.message.clone()),
        })
    }
}
