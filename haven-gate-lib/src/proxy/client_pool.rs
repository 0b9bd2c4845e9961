use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{TimeoutConfig, UpstreamConfig};

pub type HttpClient = Client<HttpConnector, Incoming>;

/// Shared HTTP/1.1 client for upstream connections
///
/// Keeps idle connections to the upstream alive between requests instead of
/// opening a new TCP connection for each one.
#[derive(Clone)]
pub struct ClientPool {
    client: Arc<HttpClient>,
}

impl ClientPool {
    pub fn new(upstream: &UpstreamConfig, timeout: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(timeout.connect_ms)));
        connector.set_nodelay(true);

        let mut builder = Client::builder(TokioExecutor::new());
        builder.pool_idle_timeout(Duration::from_secs(upstream.pool_idle_secs));
        if upstream.pool_max_idle > 0 {
            builder.pool_max_idle_per_host(upstream.pool_max_idle);
        }

        Self { client: Arc::new(builder.build(connector)) }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}
