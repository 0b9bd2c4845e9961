use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::gate::Gate;
use crate::proxy::client_pool::ClientPool;
use crate::telemetry::Metrics;

/// State shared by every connection of one server
pub struct ServerContext {
    pub config: Arc<Config>,
    pub gate: Gate,
    pub pool: ClientPool,
    pub metrics: Option<Arc<Metrics>>,
}

impl ServerContext {
    pub fn new(config: Arc<Config>, gate: Gate, metrics: Option<Arc<Metrics>>) -> Self {
        let pool = ClientPool::new(&config.upstream, &config.timeout);
        let gate = match &metrics {
            Some(m) => gate.with_metrics(m.clone()),
            None => gate,
        };
        Self { config, gate, pool, metrics }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout.upstream_ms)
    }
}
