mod loader;
mod route;
mod security;
mod telemetry;
mod timeout;
mod types;

pub use loader::{load_from_path, parse_config};
pub use route::{RouteAccess, RouteConfig, RouteKind, RouteRateLimitConfig};
pub use security::{
    AuthConfig, CspConfig, CustomHeader, FailurePolicy, HstsConfig, RateLimitConfig,
    ScreeningConfig, SecurityConfig, SecurityHeaders, TokenEntry,
};
pub use telemetry::{LoggingConfig, TelemetryConfig};
pub use timeout::TimeoutConfig;
pub use types::{Config, RedirectConfig, UpstreamConfig};
