use opentelemetry::metrics::UpDownCounter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Holds one slot of the connection limit for the lifetime of a connection
///
/// Dropping it frees the slot and, when it was the last open connection,
/// wakes the shutdown drain.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
    closed_tx: watch::Sender<()>,
    connections_active: Option<UpDownCounter<i64>>,
}

impl ConnectionGuard {
    pub(super) fn new(
        counter: Arc<AtomicUsize>,
        closed_tx: watch::Sender<()>,
        connections_active: Option<UpDownCounter<i64>>,
    ) -> Self {
        Self { counter, closed_tx, connections_active }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let remaining = self.counter.fetch_sub(1, Ordering::AcqRel);
        if let Some(ref counter) = self.connections_active {
            counter.add(-1, &[]);
        }
        if remaining == 1 {
            // nobody may be draining yet
            let _ = self.closed_tx.send(());
        }
    }
}
