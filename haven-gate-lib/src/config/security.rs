use serde::Deserialize;

/// Security configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    /// Maximum number of concurrent connections allowed
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Security headers configuration
    #[serde(default)]
    pub headers: SecurityHeaders,
    /// Query parameter screening configuration
    #[serde(default)]
    pub screening: ScreeningConfig,
    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Token verification configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            headers: SecurityHeaders::default(),
            screening: ScreeningConfig::default(),
            rate_limit: RateLimitConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

fn default_max_connections() -> usize {
    512
}

/// Custom header added to every response
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CustomHeader {
    pub name: String,
    pub value: String,
}

/// Security headers configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct SecurityHeaders {
    /// Custom headers to add to all responses
    #[serde(default)]
    pub custom: Vec<CustomHeader>,
    /// HSTS (HTTP Strict Transport Security) configuration
    #[serde(default)]
    pub hsts: HstsConfig,
    /// CSP (Content Security Policy) configuration
    #[serde(default)]
    pub csp: CspConfig,
}

/// HSTS (HTTP Strict Transport Security) configuration
///
/// Reference: RFC 6797 - https://tools.ietf.org/html/rfc6797
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HstsConfig {
    /// Enable HSTS (only applies when the client reached us over HTTPS,
    /// as reported by `X-Forwarded-Proto` from the terminating load balancer)
    #[serde(default)]
    pub enabled: bool,
    /// Max age in seconds
    /// Default: 31536000 (1 year)
    #[serde(default = "default_hsts_max_age")]
    pub max_age: u64,
    /// Include subdomains in HSTS policy (includeSubDomains directive)
    #[serde(default)]
    pub include_subdomains: bool,
    /// Add preload directive for HSTS preload list submission
    #[serde(default)]
    pub preload: bool,
}

impl Default for HstsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_age: default_hsts_max_age(),
            include_subdomains: false,
            preload: false,
        }
    }
}

fn default_hsts_max_age() -> u64 {
    31536000 // 1 year
}

/// CSP (Content Security Policy) configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CspConfig {
    /// Enable CSP
    #[serde(default)]
    pub enabled: bool,
    /// CSP policy string
    #[serde(default = "default_csp_policy")]
    pub policy: String,
}

impl Default for CspConfig {
    fn default() -> Self {
        Self { enabled: false, policy: default_csp_policy() }
    }
}

fn default_csp_policy() -> String {
    "default-src 'self'".to_string()
}

/// Query parameter screening configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ScreeningConfig {
    /// Reject requests whose query values look like SQL injection,
    /// path traversal or script injection
    /// Default: true
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// What the rate stage does when the window store cannot be read or written
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Reject the request with 503
    #[default]
    Closed,
    /// Let the request through without rate-limit accounting
    Open,
}

/// Rate limiting configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    /// Default: true
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum requests per window and key
    /// Default: 100
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Window duration in milliseconds
    /// Default: 900000 (15 minutes)
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Message returned with 429 responses
    #[serde(default = "default_message")]
    pub message: String,
    /// How often expired windows are evicted, in seconds
    /// Default: 60
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Behaviour on window store failure
    /// Default: "closed"
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: default_limit(),
            window_ms: default_window_ms(),
            message: default_message(),
            sweep_interval_secs: default_sweep_interval_secs(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_limit() -> u32 {
    100
}

fn default_window_ms() -> u64 {
    15 * 60 * 1000
}

fn default_message() -> String {
    "Too many requests from this IP, please try again later.".to_string()
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// Token verification configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AuthConfig {
    /// Cookie carrying the session token for page routes
    /// Default: "token"
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Issued tokens, stored as SHA-256 digests
    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { cookie_name: default_cookie_name(), tokens: vec![] }
    }
}

fn default_cookie_name() -> String {
    "token".to_string()
}

/// An issued token and its claims
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenEntry {
    /// Lowercase hex SHA-256 digest of the token
    pub sha256: String,
    /// Subject (user id) the token was issued to
    pub subject: String,
    /// Role claim: "user", "therapist" or "admin"
    pub role: crate::security::auth::Role,
    /// Expiry as Unix seconds
    pub expires_at: u64,
}
