use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::telemetry::Metrics;

use super::guards::ConnectionGuard;

/// Errors that can occur when trying to accept a connection
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Server is shutting down")]
    Shutdown,
    #[error("Connection limit exceeded (current: {current}, limit: {limit})")]
    LimitExceeded { current: usize, limit: usize },
}

/// Enforces the connection limit and tracks open connections for shutdown
pub struct ConnectionManager {
    active_connections: Arc<AtomicUsize>,
    max_connections: usize,
    shutdown: CancellationToken,
    closed_tx: watch::Sender<()>,
}

impl ConnectionManager {
    pub fn new(max_connections: usize, shutdown: CancellationToken) -> Self {
        let (closed_tx, _) = watch::channel(());
        Self {
            active_connections: Arc::new(AtomicUsize::new(0)),
            max_connections,
            shutdown,
            closed_tx,
        }
    }

    pub fn active(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    /// Try to accept a new connection
    /// Returns Ok(guard) if connection is accepted, Err(ConnectionError) if rejected
    pub fn try_accept(
        &self,
        peer: SocketAddr,
        metrics: Option<&Arc<Metrics>>,
    ) -> Result<ConnectionGuard, ConnectionError> {
        if self.shutdown.is_cancelled() {
            return Err(ConnectionError::Shutdown);
        }

        let reserved = self.active_connections.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |current| (current < self.max_connections).then_some(current + 1),
        );
        if let Err(current) = reserved {
            if let Some(m) = metrics {
                m.connections_rejected_total.add(1, &[]);
            }
            warn!(
                current,
                limit = self.max_connections,
                peer = %peer,
                "Connection limit exceeded, rejecting connection"
            );
            return Err(ConnectionError::LimitExceeded { current, limit: self.max_connections });
        }

        if let Some(m) = metrics {
            m.connections_total.add(1, &[]);
            m.connections_active.add(1, &[]);
        }

        Ok(ConnectionGuard::new(
            self.active_connections.clone(),
            self.closed_tx.clone(),
            metrics.map(|m| m.connections_active.clone()),
        ))
    }

    /// Wait until every open connection has closed or `timeout` elapses.
    /// Returns the number of connections still open.
    pub async fn drain(&self, timeout: Duration) -> usize {
        let mut closed_rx = self.closed_tx.subscribe();
        let wait_all_closed = async {
            while self.active() > 0 {
                if closed_rx.changed().await.is_err() {
                    break;
                }
            }
        };
        let _ = tokio::time::timeout(timeout, wait_all_closed).await;
        self.active()
    }
}
