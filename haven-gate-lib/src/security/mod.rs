pub mod auth;
pub mod headers;
pub mod rate_limit;
pub mod screening;

pub use auth::{extract_token, AuthError, AuthToken, Role, StaticTokenVerifier, TokenVerifier};
pub use headers::{apply_security_headers, is_https_request};
pub use screening::{screen_query, ScreeningHit, ThreatKind};
