//! Event emission for monitoring collaborators.
//!
//! # Design Decisions
//! - Publish/subscribe over a broadcast channel so monitoring collaborators
//!   can be tested in isolation from the core
//! - Emission never blocks and never fails the request path; a send with no
//!   live subscribers is silently dropped
//! - Events are serializable so collaborators can ship them as JSON

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// Capacity of the event channel; slow subscribers observe lag, not backpressure.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notifications emitted as circuits change state or anomalies are detected.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuardEvent {
    CircuitOpened {
        service: String,
        error: String,
        failure_count: u32,
    },
    CircuitHalfOpen {
        service: String,
    },
    CircuitClosed {
        service: String,
    },
    AnomalyDetected {
        service: String,
        anomaly_score: f64,
        details: Value,
    },
    EmergencyProtocol {
        service: String,
        error: String,
        severity: String,
        timestamp_ms: u64,
    },
}

/// Broadcast fan-out for [`GuardEvent`]s.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<GuardEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GuardEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: GuardEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Milliseconds since the unix epoch, saturating at zero for pre-epoch clocks.
pub(crate) fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(GuardEvent::CircuitHalfOpen {
            service: "wayfinding".into(),
        });
        match rx.recv().await.unwrap() {
            GuardEvent::CircuitHalfOpen { service } => assert_eq!(service, "wayfinding"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.emit(GuardEvent::CircuitClosed {
            service: "baggage-tracker".into(),
        });
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = GuardEvent::CircuitOpened {
            service: "ai-concierge".into(),
            error: "timeout".into(),
            failure_count: 5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "circuit_opened");
        assert_eq!(json["failure_count"], 5);
    }
}
