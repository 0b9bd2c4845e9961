use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, UpDownCounter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::sync::Arc;

pub mod labels {
    pub const ERROR_TYPE: &str = "error_type";
    pub const ROUTE: &str = "route";
    pub const PROTOCOL: &str = "protocol";
    pub const STATUS_CODE: &str = "status_code";
    pub const METHOD: &str = "method";
    pub const REASON: &str = "reason";
    pub const UPSTREAM: &str = "upstream";
    pub const VERSION: &str = "version";
    pub const RUST_VERSION: &str = "rust_version";
}

pub mod values {
    pub const ROUTE_UNMATCHED: &str = "unmatched";
    pub const ERROR_STORE: &str = "store";
}

#[derive(Clone)]
pub struct Metrics {
    pub connections_total: Counter<u64>,
    pub connections_active: UpDownCounter<i64>,
    pub connections_rejected_total: Counter<u64>,

    pub requests_total: Counter<u64>,
    pub requests_duration_seconds: Histogram<f64>,

    // Gate pipeline
    pub gate_rejections_total: Counter<u64>,

    // Rate limiting metrics
    pub rate_limit_requests_total: Counter<u64>,
    pub rate_limit_allowed_total: Counter<u64>,
    pub rate_limit_rejected_total: Counter<u64>,
    pub rate_limit_store_errors_total: Counter<u64>,
    pub rate_limit_windows: Gauge<u64>,
    pub sweeper_evictions_total: Counter<u64>,

    pub upstream_requests_total: Counter<u64>,
    pub upstream_errors_total: Counter<u64>,
    pub upstream_duration_seconds: Histogram<f64>,

    // Build info
    pub build_info: Gauge<u64>,
}

impl Metrics {
    /// Build the instrument set on `meter`. Tests can pass a meter from the
    /// no-op global provider.
    pub fn new(meter: Meter) -> Self {
        Self {
            connections_total: meter
                .u64_counter("haven_connections_total")
                .with_description("Total number of connections accepted")
                .build(),
            connections_active: meter
                .i64_up_down_counter("haven_connections_active")
                .with_description("Number of active connections")
                .build(),
            connections_rejected_total: meter
                .u64_counter("haven_connections_rejected_total")
                .with_description("Total number of connections rejected due to connection limit")
                .build(),

            requests_total: meter
                .u64_counter("haven_requests_total")
                .with_description("Total number of requests processed")
                .build(),
            requests_duration_seconds: meter
                .f64_histogram("haven_requests_duration_seconds")
                .with_description("Request duration in seconds")
                .build(),

            gate_rejections_total: meter
                .u64_counter("haven_gate_rejections_total")
                .with_description("Requests terminated by the gate. reason=input_rejected|rate_limited|unauthenticated|unauthorized|unavailable")
                .build(),

            rate_limit_requests_total: meter
                .u64_counter("haven_rate_limit_requests_total")
                .with_description("Total number of requests evaluated by the rate limiter")
                .build(),
            rate_limit_allowed_total: meter
                .u64_counter("haven_rate_limit_allowed_total")
                .with_description("Total number of requests allowed by the rate limiter")
                .build(),
            rate_limit_rejected_total: meter
                .u64_counter("haven_rate_limit_rejected_total")
                .with_description("Total number of requests rejected by the rate limiter (429)")
                .build(),
            rate_limit_store_errors_total: meter
                .u64_counter("haven_rate_limit_store_errors_total")
                .with_description("Total number of window store failures seen by the rate stage")
                .build(),
            rate_limit_windows: meter
                .u64_gauge("haven_rate_limit_windows")
                .with_description("Number of rate limit windows held after the last sweep")
                .build(),
            sweeper_evictions_total: meter
                .u64_counter("haven_sweeper_evictions_total")
                .with_description("Total number of expired rate limit windows evicted")
                .build(),

            upstream_requests_total: meter
                .u64_counter("haven_upstream_requests_total")
                .with_description("Total number of requests forwarded upstream")
                .build(),
            upstream_errors_total: meter
                .u64_counter("haven_upstream_errors_total")
                .with_description("Total number of upstream errors")
                .build(),
            upstream_duration_seconds: meter
                .f64_histogram("haven_upstream_duration_seconds")
                .with_description("Upstream request duration in seconds")
                .build(),

            build_info: meter
                .u64_gauge("haven_build_info")
                .with_description("Build information (version, rust version)")
                .build(),
        }
    }

    /// Set build info metric with version labels
    pub fn set_build_info(&self) {
        let version = env!("CARGO_PKG_VERSION");
        let rust_version = env!("CARGO_PKG_RUST_VERSION");

        self.build_info.record(
            1,
            &[
                KeyValue::new(labels::VERSION, version),
                KeyValue::new(labels::RUST_VERSION, rust_version),
            ],
        );
    }

    pub fn record_gate_rejection(&self, reason: &str, route: &str) {
        self.gate_rejections_total.add(
            1,
            &[
                KeyValue::new(labels::REASON, reason.to_string()),
                KeyValue::new(labels::ROUTE, route.to_string()),
            ],
        );
    }

    pub fn record_rate_limit_request(&self, route: &str) {
        self.rate_limit_requests_total
            .add(1, &[KeyValue::new(labels::ROUTE, route.to_string())]);
    }

    pub fn record_rate_limit_allowed(&self, route: &str) {
        self.rate_limit_allowed_total
            .add(1, &[KeyValue::new(labels::ROUTE, route.to_string())]);
    }

    pub fn record_rate_limit_rejection(&self, route: &str) {
        self.rate_limit_rejected_total
            .add(1, &[KeyValue::new(labels::ROUTE, route.to_string())]);
    }

    pub fn record_rate_limit_store_error(&self) {
        self.rate_limit_store_errors_total
            .add(1, &[KeyValue::new(labels::ERROR_TYPE, values::ERROR_STORE)]);
    }

    pub fn record_sweep(&self, evicted: usize, remaining: usize) {
        if evicted > 0 {
            self.sweeper_evictions_total.add(evicted as u64, &[]);
        }
        self.rate_limit_windows.record(remaining as u64, &[]);
    }

    pub fn record_upstream_request(&self, upstream: &str, status_code: u16, route: &str) {
        self.upstream_requests_total.add(
            1,
            &[
                KeyValue::new(labels::UPSTREAM, upstream.to_string()),
                KeyValue::new(labels::STATUS_CODE, status_code.to_string()),
                KeyValue::new(labels::ROUTE, route.to_string()),
            ],
        );
    }

    pub fn record_upstream_duration(
        &self,
        duration: f64,
        upstream: &str,
        status_code: u16,
        route: &str,
    ) {
        self.upstream_duration_seconds.record(
            duration,
            &[
                KeyValue::new(labels::UPSTREAM, upstream.to_string()),
                KeyValue::new(labels::STATUS_CODE, status_code.to_string()),
                KeyValue::new(labels::ROUTE, route.to_string()),
            ],
        );
    }

    pub fn record_upstream_error(&self, upstream: &str, error_type: &str, route: &str) {
        self.upstream_errors_total.add(
            1,
            &[
                KeyValue::new(labels::UPSTREAM, upstream.to_string()),
                KeyValue::new(labels::ERROR_TYPE, error_type.to_string()),
                KeyValue::new(labels::ROUTE, route.to_string()),
            ],
        );
    }

    pub fn record_request(&self, method: &str, status_code: u16, protocol: &str, route: &str) {
        self.requests_total.add(
            1,
            &[
                KeyValue::new(labels::METHOD, method.to_string()),
                KeyValue::new(labels::STATUS_CODE, status_code.to_string()),
                KeyValue::new(labels::PROTOCOL, protocol.to_string()),
                KeyValue::new(labels::ROUTE, route.to_string()),
            ],
        );
    }

    pub fn record_request_duration(
        &self,
        duration: f64,
        method: &str,
        status_code: u16,
        protocol: &str,
        route: &str,
    ) {
        self.requests_duration_seconds.record(
            duration,
            &[
                KeyValue::new(labels::METHOD, method.to_string()),
                KeyValue::new(labels::STATUS_CODE, status_code.to_string()),
                KeyValue::new(labels::PROTOCOL, protocol.to_string()),
                KeyValue::new(labels::ROUTE, route.to_string()),
            ],
        );
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("haven-gate");
    let metrics = Arc::new(Metrics::new(meter));

    metrics.set_build_info();

    Ok((metrics, registry))
}
