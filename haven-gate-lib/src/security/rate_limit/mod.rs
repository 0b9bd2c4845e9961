//! Fixed-window rate limiting for the gate.
//!
//! The rate stage is built from four pieces:
//!
//! 1. **Window store** (`store.rs`): per-key `{count, reset_at}` state behind the
//!    [`WindowStore`] trait, with an in-memory implementation.
//! 2. **Limiter** (`limiter.rs`): the fixed-window decision function. Its
//!    read-modify-write of a window is serialized so concurrent requests for
//!    the same key never over-admit.
//! 3. **Manager** (`manager.rs`): global and per-route [`LimitPolicy`] lookup,
//!    key scoping and client key derivation.
//! 4. **Sweeper** (`sweeper.rs`): background eviction of expired windows.
//!
//! Fixed windows admit up to `2 × limit` requests across a window boundary
//! (a burst at the end of one window followed by a burst at the start of the
//! next). That is accepted behaviour of the algorithm.
//!
//! # Example Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use haven_gate_lib::security::rate_limit::*;
//!
//! let store = Arc::new(InMemoryWindowStore::new());
//! let limiter = FixedWindowLimiter::new(store, Arc::new(SystemClock));
//! let policy = LimitPolicy::new(3, 1000);
//!
//! let decision = limiter.decide("1.2.3.4", &policy)?;
//! if !decision.allowed {
//!     println!("retry in {}s", decision.retry_after_secs());
//! }
//! ```

mod clock;
mod limiter;
mod manager;
mod policy;
mod store;
mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{FixedWindowLimiter, RateDecision};
pub use manager::{extract_rate_limit_key, RateLimitManager, ScopedDecision, UNKNOWN_CLIENT_KEY};
pub use policy::LimitPolicy;
pub use store::{InMemoryWindowStore, RateWindow, StoreError, WindowStore};
pub use sweeper::{spawn_sweeper, sweep_once};
