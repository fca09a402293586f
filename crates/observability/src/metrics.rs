//! Prometheus metrics infrastructure
//!
//! `init_metrics` installs the exporter; `SessionMetrics` holds the handles
//! the correlation session updates. Without an installed recorder every
//! handle is a no-op, so sessions can always carry metrics.

use metrics::{counter, gauge, Counter, Gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize the Prometheus metrics exporter
///
/// Starts an HTTP listener on the given port exposing `/metrics`.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Correlation session metrics
///
/// * `sigmaflow_requests_issued_total{kind}` - requests sent to the provider
/// * `sigmaflow_callbacks_total` - provider callbacks received
/// * `sigmaflow_callbacks_dropped_total` - stale or mismatched callbacks
/// * `sigmaflow_requests_in_flight` - registry size
/// * `sigmaflow_tickers_completed_total`
/// * `sigmaflow_tickers_timed_out_total`
#[derive(Clone)]
pub struct SessionMetrics {
    requests_by_kind: fn(&'static str) -> Counter,
    callbacks_total: Counter,
    callbacks_dropped: Counter,
    requests_in_flight: Gauge,
    tickers_completed: Counter,
    tickers_timed_out: Counter,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            requests_by_kind: |kind| counter!("sigmaflow_requests_issued_total", "kind" => kind),
            callbacks_total: counter!("sigmaflow_callbacks_total"),
            callbacks_dropped: counter!("sigmaflow_callbacks_dropped_total"),
            requests_in_flight: gauge!("sigmaflow_requests_in_flight"),
            tickers_completed: counter!("sigmaflow_tickers_completed_total"),
            tickers_timed_out: counter!("sigmaflow_tickers_timed_out_total"),
        }
    }

    /// Record a request issued to the provider
    pub fn request_issued(&self, kind: &'static str) {
        (self.requests_by_kind)(kind).increment(1);
        self.requests_in_flight.increment(1.0);
    }

    /// Record a request removed from the registry
    pub fn request_released(&self) {
        self.requests_in_flight.decrement(1.0);
    }

    pub fn callback_received(&self) {
        self.callbacks_total.increment(1);
    }

    pub fn callback_dropped(&self) {
        self.callbacks_dropped.increment(1);
    }

    pub fn ticker_completed(&self) {
        self.tickers_completed.increment(1);
    }

    pub fn ticker_timed_out(&self) {
        self.tickers_timed_out.increment(1);
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}
