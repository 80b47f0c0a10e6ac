use commonware_runtime::Metrics as RuntimeMetrics;
use prometheus_client::metrics::{counter::Counter, gauge::Gauge};

/// Metrics for the [`Engine`](super::Engine).
#[derive(Default)]
pub(super) struct Metrics {
    /// Number of messages broadcast by this node
    pub broadcasts: Counter,
    /// Number of data gossips received
    pub data: Counter,
    /// Number of attestation gossips received
    pub attestations: Counter,
    /// Number of gossips that failed to decode
    pub invalid: Counter,
    /// Number of gossip handlers currently tracked
    pub handlers: Gauge,
}

impl Metrics {
    /// Create and register a new set of metrics with the given context.
    pub fn init<E: RuntimeMetrics>(context: &E) -> Self {
        let metrics = Self::default();
        context.register(
            "broadcasts",
            "Number of messages broadcast by this node",
            metrics.broadcasts.clone(),
        );
        context.register(
            "data",
            "Number of data gossips received",
            metrics.data.clone(),
        );
        context.register(
            "attestations",
            "Number of attestation gossips received",
            metrics.attestations.clone(),
        );
        context.register(
            "invalid",
            "Number of gossips that failed to decode",
            metrics.invalid.clone(),
        );
        context.register(
            "handlers",
            "Number of gossip handlers currently tracked",
            metrics.handlers.clone(),
        );
        metrics
    }
}
