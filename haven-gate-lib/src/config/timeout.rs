use serde::Deserialize;

/// Timeout configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutConfig {
    /// Upstream connect timeout in milliseconds
    /// Default: 5000 (5 seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,
    /// Maximum time to wait for the upstream response headers, in milliseconds
    /// Requests exceeding it are answered with 504
    /// Default: 30000 (30 seconds)
    #[serde(default = "default_upstream_timeout")]
    pub upstream_ms: u64,
    /// Graceful shutdown timeout in seconds
    /// Default: 30
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            upstream_ms: default_upstream_timeout(),
            shutdown_secs: default_shutdown_timeout(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_upstream_timeout() -> u64 {
    30000
}

fn default_shutdown_timeout() -> u64 {
    30
}
