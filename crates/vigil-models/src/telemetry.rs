//! Telemetry event schema for the external metrics sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Closed set of pipeline events worth reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryKind {
    BatchCompleted,
    BatchSplit,
    TierEscalated,
    MemoryPressure,
    CacheClear,
    FrameDropped,
    SkipPlanUpdated,
    SessionExhausted,
}

impl TelemetryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryKind::BatchCompleted => "batch_completed",
            TelemetryKind::BatchSplit => "batch_split",
            TelemetryKind::TierEscalated => "tier_escalated",
            TelemetryKind::MemoryPressure => "memory_pressure",
            TelemetryKind::CacheClear => "cache_clear",
            TelemetryKind::FrameDropped => "frame_dropped",
            TelemetryKind::SkipPlanUpdated => "skip_plan_updated",
            TelemetryKind::SessionExhausted => "session_exhausted",
        }
    }
}

impl fmt::Display for TelemetryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fire-and-forget observability event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    #[serde(rename = "type")]
    pub kind: TelemetryKind,
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
}

impl TelemetryEvent {
    pub fn new(kind: TelemetryKind, session_id: Uuid, payload: Value) -> Self {
        Self {
            kind,
            session_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let event = TelemetryEvent::new(
            TelemetryKind::TierEscalated,
            Uuid::nil(),
            json!({ "from_rank": 0, "to_rank": 1 }),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tier_escalated");
        assert_eq!(json["payload"]["to_rank"], 1);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(TelemetryKind::BatchSplit.to_string(), "batch_split");
    }
}
