#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod gate;
pub mod proxy;
pub mod security;
pub mod telemetry;

pub use config::{load_from_path, Config, RouteAccess, RouteConfig, RouteKind};
pub use error::{GateError, Result};
pub use gate::{Admission, Gate, GateRequest, Rejection};
pub use proxy::run;
pub use security::rate_limit::{
    Clock, FixedWindowLimiter, InMemoryWindowStore, LimitPolicy, RateDecision, RateWindow,
    SystemClock, WindowStore,
};
