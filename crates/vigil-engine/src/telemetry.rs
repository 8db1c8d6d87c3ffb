//! Metrics sink trait and built-in sinks.

use tracing::debug;
use vigil_models::TelemetryEvent;

/// Receiver for pipeline telemetry.
///
/// `record` is fire-and-forget: implementations must not block the
/// pipeline. Anything slow (network, disk) belongs behind a channel.
pub trait MetricsSink: Send + Sync {
    fn record(&self, event: TelemetryEvent);
}

/// Sink that emits events as structured `tracing` records.
#[derive(Debug, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record(&self, event: TelemetryEvent) {
        debug!(
            session_id = %event.session_id,
            kind = %event.kind,
            payload = %event.payload,
            "telemetry event"
        );
    }
}

/// Sink that drops all events.
#[derive(Debug, Default)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn record(&self, _event: TelemetryEvent) {}
}

/// Sink backed by an unbounded channel. Sending never blocks; if the
/// receiver is gone the event is dropped.
#[derive(Debug)]
pub struct ChannelSink {
    tx: tokio::sync::mpsc::UnboundedSender<TelemetryEvent>,
}

impl ChannelSink {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<TelemetryEvent>) -> Self {
        Self { tx }
    }
}

impl MetricsSink for ChannelSink {
    fn record(&self, event: TelemetryEvent) {
        let _ = self.tx.send(event);
    }
}
