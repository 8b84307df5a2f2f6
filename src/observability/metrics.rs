//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (requests, latency, cache, retries, reloads)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by source and status
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_cache_lookups_total` (counter): cache hits and misses
//! - `proxy_upstream_retries_total` (counter): 503 failovers
//! - `proxy_config_reloads_total` (counter): bundle loads by result
//!
//! # Design Decisions
//! - Low-overhead metric updates; without an installed recorder they are no-ops
//! - Labels kept low-cardinality (no host or path labels)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Upstream,
    Fallback,
    Blocked,
    Admin,
    Error,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Upstream => "upstream",
            ResponseSource::Fallback => "fallback",
            ResponseSource::Blocked => "blocked",
            ResponseSource::Admin => "admin",
            ResponseSource::Error => "error",
        }
    }
}

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(source: ResponseSource, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "source" => source.as_str(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "source" => source.as_str())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(hit: bool) {
    counter!("proxy_cache_lookups_total", "result" => if hit { "hit" } else { "miss" }).increment(1);
}

pub fn record_upstream_retry() {
    counter!("proxy_upstream_retries_total").increment(1);
}

pub fn record_reload(ok: bool) {
    counter!("proxy_config_reloads_total", "result" => if ok { "ok" } else { "error" }).increment(1);
}
