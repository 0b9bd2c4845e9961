use serde::Deserialize;
use std::net::SocketAddr;

use super::route::RouteConfig;
use super::security::SecurityConfig;
use super::telemetry::{LoggingConfig, TelemetryConfig};
use super::timeout::TimeoutConfig;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address and port to listen on
    /// Example: "0.0.0.0:8080" or "127.0.0.1:8080"
    pub listen: SocketAddr,
    /// Application server that admitted requests are forwarded to
    pub upstream: UpstreamConfig,
    /// Path-based gate rules (optional)
    /// First matching prefix wins; unmatched paths are public
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    /// Redirect targets for rejected page (non-API) requests
    #[serde(default)]
    pub redirects: RedirectConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Timeout configuration
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Security configuration (screening, rate limiting, auth, headers)
    #[serde(default)]
    pub security: SecurityConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Upstream application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// Upstream address (host:port format)
    /// Example: "127.0.0.1:3000" or "web:3000"
    pub address: String,
    /// Idle pooled connections are closed after this many seconds
    /// Default: 90
    #[serde(default = "default_pool_idle_secs")]
    pub pool_idle_secs: u64,
    /// Maximum idle pooled connections kept for the upstream (0 = unlimited)
    /// Default: 32
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle: usize,
}

fn default_pool_idle_secs() -> u64 {
    90
}

fn default_pool_max_idle() -> usize {
    32
}

/// Where page routes send browsers that fail the auth gate
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RedirectConfig {
    /// Target for missing or invalid credentials
    /// Default: "/login"
    #[serde(default = "default_login_path")]
    pub login: String,
    /// Target for authenticated users lacking the required role
    /// Default: "/dashboard"
    #[serde(default = "default_dashboard_path")]
    pub dashboard: String,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self { login: default_login_path(), dashboard: default_dashboard_path() }
    }
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_dashboard_path() -> String {
    "/dashboard".to_string()
}
