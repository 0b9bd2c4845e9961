//! Fixed-window limiter.

use std::sync::{Arc, Mutex};

use super::clock::Clock;
use super::policy::LimitPolicy;
use super::store::{RateWindow, StoreError, WindowStore};

/// Outcome of one limiter decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request fits in the current window
    pub allowed: bool,
    /// Policy limit the decision was made against
    pub limit: u32,
    /// Requests still available in the window
    pub remaining: u32,
    /// Unix milliseconds at which the window ends
    pub reset_at: u64,
    /// Unix milliseconds at which the decision was taken
    pub decided_at: u64,
}

impl RateDecision {
    /// Seconds until the window resets, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        self.reset_at.saturating_sub(self.decided_at).div_ceil(1000)
    }

    /// Window end as Unix seconds, rounded up.
    pub fn reset_at_secs(&self) -> u64 {
        self.reset_at.div_ceil(1000)
    }
}

/// A fixed-window rate limiter over an injected [`WindowStore`].
///
/// # Algorithm
///
/// For a key and a policy `{limit, window_ms}` at time `now`:
/// - no window, or `reset_at <= now`: start a fresh window `{count: 1,
///   reset_at: now + window_ms}` and allow
/// - `count >= limit`: deny without touching the window
/// - otherwise increment `count` and allow
///
/// A request arriving exactly at `reset_at` opens a fresh window.
///
/// # Thread Safety
///
/// The get/modify/set span runs under a limiter-wide mutex, so concurrent
/// callers for the same key never admit more than `limit` requests per window.
/// Sweeps go through [`Self::sweep_expired`] and take the same mutex: a sweep
/// never lands between a decision's clock read and its store update.
pub struct FixedWindowLimiter {
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
    critical: Mutex<()>,
}

impl FixedWindowLimiter {
    pub fn new(store: Arc<dyn WindowStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock, critical: Mutex::new(()) }
    }

    /// Decide whether one more request for `key` is allowed under `policy`.
    pub fn decide(&self, key: &str, policy: &LimitPolicy) -> Result<RateDecision, StoreError> {
        let _guard = self.critical.lock().map_err(|_| StoreError::Poisoned)?;
        let now = self.clock.now_ms();
        let limit = policy.limit;

        match self.store.get(key)? {
            Some(window) if window.reset_at > now => {
                if window.count >= limit {
                    return Ok(RateDecision {
                        allowed: false,
                        limit,
                        remaining: 0,
                        reset_at: window.reset_at,
                        decided_at: now,
                    });
                }

                let count = window.count.saturating_add(1);
                self.store.set(key, RateWindow { count, reset_at: window.reset_at })?;
                Ok(RateDecision {
                    allowed: true,
                    limit,
                    remaining: limit.saturating_sub(count),
                    reset_at: window.reset_at,
                    decided_at: now,
                })
            }
            _ => {
                let reset_at = now.saturating_add(policy.window_ms);
                self.store.set(key, RateWindow { count: 1, reset_at })?;
                Ok(RateDecision {
                    allowed: true,
                    limit,
                    remaining: limit.saturating_sub(1),
                    reset_at,
                    decided_at: now,
                })
            }
        }
    }

    /// Evict every window already past `reset_at`. Returns how many went.
    pub fn sweep_expired(&self) -> Result<usize, StoreError> {
        let _guard = self.critical.lock().map_err(|_| StoreError::Poisoned)?;
        self.store.sweep(self.clock.now_ms())
    }

    pub fn store(&self) -> &Arc<dyn WindowStore> {
        &self.store
    }
}
