use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{FixedWindowLimiter, StoreError};
use crate::telemetry::Metrics;

/// Evict every window whose `reset_at` is already in the past. Serialized
/// with the limiter's decisions.
pub fn sweep_once(limiter: &FixedWindowLimiter) -> Result<usize, StoreError> {
    limiter.sweep_expired()
}

/// Run [`sweep_once`] every `interval` until `shutdown` is cancelled.
///
/// Runs on its own task, apart from request handling. If it is never
/// spawned, the store grows with every distinct client key.
pub fn spawn_sweeper(
    limiter: Arc<FixedWindowLimiter>,
    interval: Duration,
    shutdown: CancellationToken,
    metrics: Option<Arc<Metrics>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        info!(interval_secs = interval.as_secs(), "Rate limit sweeper started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match sweep_once(&limiter) {
                        Ok(evicted) => {
                            let remaining = limiter.store().len();
                            debug!(evicted, remaining, "Swept expired rate limit windows");
                            if let Some(m) = &metrics {
                                m.record_sweep(evicted, remaining);
                            }
                        }
                        Err(e) => warn!(error = %e, "Rate limit sweep failed"),
                    }
                }
            }
        }

        info!("Rate limit sweeper stopped");
    })
}
