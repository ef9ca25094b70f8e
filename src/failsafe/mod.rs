//! Tiered failsafe resolution and the emergency protocol.
//!
//! # Responsibilities
//! - Hold the per-service mapping of primary/secondary/emergency mechanisms
//! - Serve the static default degraded-mode payload when a circuit is open
//!   and the caller supplied no fallback
//! - Build the emergency escalation event for critical services
//!
//! # Design Decisions
//! - Mappings are fixed at construction, like the service registry itself
//! - The emergency protocol performs no remediation; it emits a high-severity
//!   event for a monitoring collaborator and never throws onward

use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ServiceConfig;
use crate::error::GuardError;
use crate::events::{unix_millis, GuardEvent};

/// Named failsafe tiers, ordered by escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailsafeLevel {
    Primary,
    Secondary,
    Emergency,
}

impl fmt::Display for FailsafeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailsafeLevel::Primary => "primary",
            FailsafeLevel::Secondary => "secondary",
            FailsafeLevel::Emergency => "emergency",
        };
        f.write_str(name)
    }
}

/// A registered degraded-mode behavior for one tier of one service.
#[derive(Debug, Clone, Serialize)]
pub struct FailsafePlan {
    pub level: FailsafeLevel,
    pub action: String,
    pub payload: Value,
}

#[derive(Debug)]
struct FailsafeMapping {
    mechanisms: HashMap<FailsafeLevel, FailsafePlan>,
    default_payload: Value,
}

/// Per-service failsafe mappings plus static default payloads.
#[derive(Debug)]
pub struct FailsafeManager {
    mappings: HashMap<String, FailsafeMapping>,
}

impl FailsafeManager {
    /// Build the mappings for the configured fleet.
    pub fn from_services(services: &[ServiceConfig]) -> Self {
        let mappings = services
            .iter()
            .map(|service| {
                (
                    service.name.clone(),
                    FailsafeMapping {
                        mechanisms: standard_mechanisms(&service.name),
                        default_payload: default_payload(service),
                    },
                )
            })
            .collect();
        Self { mappings }
    }

    /// The static degraded-mode payload served when no caller fallback exists.
    pub fn default_fallback(&self, service: &str) -> Option<Value> {
        self.mappings
            .get(service)
            .map(|m| m.default_payload.clone())
    }

    /// Resolve the named mechanism registered for the service.
    pub fn activate(&self, service: &str, level: FailsafeLevel) -> Result<FailsafePlan, GuardError> {
        self.mappings
            .get(service)
            .and_then(|m| m.mechanisms.get(&level))
            .cloned()
            .ok_or_else(|| GuardError::UnknownMechanism {
                service: service.to_string(),
                level,
            })
    }
}

/// High-severity escalation event for a critical service whose circuit opened.
pub fn emergency_event(service: &str, error: &str) -> GuardEvent {
    GuardEvent::EmergencyProtocol {
        service: service.to_string(),
        error: error.to_string(),
        severity: "critical".to_string(),
        timestamp_ms: unix_millis(SystemTime::now()),
    }
}

fn standard_mechanisms(service: &str) -> HashMap<FailsafeLevel, FailsafePlan> {
    let mut mechanisms = HashMap::new();
    mechanisms.insert(
        FailsafeLevel::Primary,
        FailsafePlan {
            level: FailsafeLevel::Primary,
            action: "cached-response".to_string(),
            payload: json!({
                "service": service,
                "mode": "cached",
                "message": "Serving the most recent known-good response.",
            }),
        },
    );
    mechanisms.insert(
        FailsafeLevel::Secondary,
        FailsafePlan {
            level: FailsafeLevel::Secondary,
            action: "simplified-mode".to_string(),
            payload: json!({
                "service": service,
                "mode": "simplified",
                "message": "Running with reduced functionality.",
            }),
        },
    );
    mechanisms.insert(
        FailsafeLevel::Emergency,
        FailsafePlan {
            level: FailsafeLevel::Emergency,
            action: "manual-operation".to_string(),
            payload: json!({
                "service": service,
                "mode": "manual",
                "message": "Automated service suspended. Staff have been alerted.",
            }),
        },
    );
    mechanisms
}

fn default_payload(service: &ServiceConfig) -> Value {
    let message = service.degraded_message.clone().unwrap_or_else(|| {
        "Service temporarily unavailable. Please ask a staff member at the nearest service desk."
            .to_string()
    });
    json!({
        "service": service.name,
        "status": "degraded",
        "fallback": true,
        "message": message,
    })
}
