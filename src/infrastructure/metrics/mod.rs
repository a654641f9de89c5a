//! Prometheus Metrics Module
//!
//! Provides gateway-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Accepted connections by protocol
//! - Handshake failures by error category
//! - Active channel gauge
//! - Inbound data messages
//! - Push attempts by result
//! - Disconnects by reason
//!
//! The gateway only records; [`gather_metrics`] hands the text exposition to
//! whoever serves it. The binary logs one snapshot when it shuts down.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

const NAMESPACE: &str = "conn_gateway";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Accepted TCP connections by configured protocol
pub static CONNECTIONS_ACCEPTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("connections_accepted_total", "Total number of accepted connections")
            .namespace(NAMESPACE),
        &["protocol"],
    )
    .expect("Failed to create CONNECTIONS_ACCEPTED_TOTAL metric")
});

/// Handshake failures by error category
pub static HANDSHAKE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("handshake_failures_total", "Total number of failed handshakes")
            .namespace(NAMESPACE),
        &["category"],
    )
    .expect("Failed to create HANDSHAKE_FAILURES_TOTAL metric")
});

/// Registered channels
pub static CHANNELS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("channels_active", "Number of registered channels").namespace(NAMESPACE),
    )
    .expect("Failed to create CHANNELS_ACTIVE metric")
});

/// Data messages handed to the message listener
pub static MESSAGES_RECEIVED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("messages_received_total", "Total number of inbound data messages")
            .namespace(NAMESPACE),
    )
    .expect("Failed to create MESSAGES_RECEIVED_TOTAL metric")
});

/// Push attempts by result ("ok", "error")
pub static PUSHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pushes_total", "Total number of push attempts").namespace(NAMESPACE),
        &["result"],
    )
    .expect("Failed to create PUSHES_TOTAL metric")
});

/// Session teardowns by reason
pub static DISCONNECTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("disconnects_total", "Total number of channel disconnects")
            .namespace(NAMESPACE),
        &["reason"],
    )
    .expect("Failed to create DISCONNECTS_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(CONNECTIONS_ACCEPTED_TOTAL.clone()))
        .expect("Failed to register CONNECTIONS_ACCEPTED_TOTAL");
    registry
        .register(Box::new(HANDSHAKE_FAILURES_TOTAL.clone()))
        .expect("Failed to register HANDSHAKE_FAILURES_TOTAL");
    registry
        .register(Box::new(CHANNELS_ACTIVE.clone()))
        .expect("Failed to register CHANNELS_ACTIVE");
    registry
        .register(Box::new(MESSAGES_RECEIVED_TOTAL.clone()))
        .expect("Failed to register MESSAGES_RECEIVED_TOTAL");
    registry
        .register(Box::new(PUSHES_TOTAL.clone()))
        .expect("Failed to register PUSHES_TOTAL");
    registry
        .register(Box::new(DISCONNECTS_TOTAL.clone()))
        .expect("Failed to register DISCONNECTS_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_connection_accepted(protocol: &str) {
    CONNECTIONS_ACCEPTED_TOTAL.with_label_values(&[protocol]).inc();
}

pub fn record_handshake_failure(category: &str) {
    HANDSHAKE_FAILURES_TOTAL.with_label_values(&[category]).inc();
}

pub fn channel_opened() {
    CHANNELS_ACTIVE.inc();
}

pub fn channel_closed() {
    CHANNELS_ACTIVE.dec();
}

pub fn record_message_received() {
    MESSAGES_RECEIVED_TOTAL.inc();
}

pub fn record_push(ok: bool) {
    let result = if ok { "ok" } else { "error" };
    PUSHES_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_disconnect(reason: &str) {
    DISCONNECTS_TOTAL.with_label_values(&[reason]).inc();
}
