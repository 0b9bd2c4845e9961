use serde::Deserialize;

/// How a route answers gate rejections
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    /// JSON API: rejections are JSON bodies with 401/403 status codes
    #[default]
    Api,
    /// HTML page: auth rejections redirect to the login or dashboard page
    Page,
}

/// Who may reach a route
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RouteAccess {
    /// No token required
    #[default]
    Public,
    /// Any valid, non-expired token
    Protected,
    /// Valid token whose role is admin
    Admin,
}

/// Gate rule for a path prefix
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RouteConfig {
    /// URL path prefix to match (e.g., "/api/admin", "/dashboard")
    /// Routes are matched in order, first match wins
    pub prefix: String,
    /// Response style for rejections
    /// Default: "api"
    #[serde(default)]
    pub kind: RouteKind,
    /// Access level
    /// Default: "public"
    #[serde(default)]
    pub access: RouteAccess,
    /// Per-route rate limit override (optional)
    /// Unset fields inherit from `[security.rate_limit]`
    #[serde(default)]
    pub rate_limit: Option<RouteRateLimitConfig>,
}

/// Per-route rate limiting configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct RouteRateLimitConfig {
    /// Enable rate limiting for this route
    /// If not specified, inherits from global config
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Maximum requests per window for this route
    pub limit: Option<u32>,
    /// Window duration in milliseconds for this route
    pub window_ms: Option<u64>,
    /// Rejection message for this route
    pub message: Option<String>,
}
