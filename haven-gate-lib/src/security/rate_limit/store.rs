use ahash::AHashMap;
use std::sync::RwLock;
use thiserror::Error;

/// Usage state of one client key inside its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    /// Requests admitted in this window
    pub count: u32,
    /// Unix milliseconds at which the window ends
    pub reset_at: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("window store lock poisoned")]
    Poisoned,

    #[error("window store unavailable: {0}")]
    Unavailable(String),
}

/// Per-key window state.
///
/// Implementations only need plain map semantics. Callers that read, modify
/// and write back a window are responsible for serializing that span (see
/// `FixedWindowLimiter`). A shared external store for multi-instance
/// deployments would implement this trait.
pub trait WindowStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<RateWindow>, StoreError>;

    fn set(&self, key: &str, window: RateWindow) -> Result<(), StoreError>;

    /// Remove every window with `reset_at < now`. Returns how many were evicted.
    fn sweep(&self, now: u64) -> Result<usize, StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local window store.
///
/// Memory grows with the number of distinct active keys; the sweeper keeps
/// it bounded.
#[derive(Debug, Default)]
pub struct InMemoryWindowStore {
    windows: RwLock<AHashMap<String, RateWindow>>,
}

impl InMemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WindowStore for InMemoryWindowStore {
    fn get(&self, key: &str) -> Result<Option<RateWindow>, StoreError> {
        let windows = self.windows.read().map_err(|_| StoreError::Poisoned)?;
        Ok(windows.get(key).copied())
    }

    fn set(&self, key: &str, window: RateWindow) -> Result<(), StoreError> {
        let mut windows = self.windows.write().map_err(|_| StoreError::Poisoned)?;
        match windows.get_mut(key) {
            Some(existing) => *existing = window,
            None => {
                windows.insert(key.to_string(), window);
            }
        }
        Ok(())
    }

    fn sweep(&self, now: u64) -> Result<usize, StoreError> {
        let mut windows = self.windows.write().map_err(|_| StoreError::Poisoned)?;
        let before = windows.len();
        windows.retain(|_, w| w.reset_at >= now);
        Ok(before.saturating_sub(windows.len()))
    }

    fn len(&self) -> usize {
        match self.windows.read() {
            Ok(guard) => guard.len(),
            Err(_) => {
                tracing::warn!("Window store lock poisoned");
                0
            }
        }
    }
}
