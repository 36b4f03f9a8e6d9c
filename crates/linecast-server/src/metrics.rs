//! Metrics collection and export for linecast.
//!
//! Uses the `metrics` crate for instrumentation and optionally exports
//! to Prometheus format.

use linecast_core::BroadcastReport;
use linecast_protocol::EventType;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "linecast_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "linecast_connections_active";
    pub const EVENTS_TOTAL: &str = "linecast_events_total";
    pub const DELIVERIES_TOTAL: &str = "linecast_deliveries_total";
    pub const TOPICS_ACTIVE: &str = "linecast_topics_active";
    pub const DECODE_ERRORS_TOTAL: &str = "linecast_decode_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of active connections"
    );
    metrics::describe_counter!(names::EVENTS_TOTAL, "Total number of decoded events by kind");
    metrics::describe_counter!(
        names::DELIVERIES_TOTAL,
        "Broadcast deliveries by outcome"
    );
    metrics::describe_gauge!(names::TOPICS_ACTIVE, "Current number of live topics");
    metrics::describe_counter!(
        names::DECODE_ERRORS_TOTAL,
        "Inbound lines rejected as malformed"
    );

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a decoded event.
pub fn record_event(kind: EventType) {
    counter!(names::EVENTS_TOTAL, "kind" => kind.to_string()).increment(1);
}

/// Record the outcome of a broadcast.
pub fn record_broadcast(report: &BroadcastReport) {
    counter!(names::DELIVERIES_TOTAL, "outcome" => "delivered").increment(report.delivered as u64);
    counter!(names::DELIVERIES_TOTAL, "outcome" => "failed").increment(report.failed as u64);
}

/// Update active topic count.
pub fn set_active_topics(count: usize) {
    gauge!(names::TOPICS_ACTIVE).set(count as f64);
}

/// Record a rejected inbound line.
pub fn record_decode_error() {
    counter!(names::DECODE_ERRORS_TOTAL).increment(1);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: every call is a no-op and must not panic.
        let _guard = ConnectionMetricsGuard::new();
        record_event(EventType::Broadcast);
        record_broadcast(&BroadcastReport {
            attempted: 2,
            delivered: 1,
            failed: 1,
        });
        set_active_topics(3);
        record_decode_error();
    }
}
