//! Shared utilities for integration testing.

use failguard::{GuardConfig, GuardEvent, ServiceConfig};
use tokio::sync::broadcast;

/// Initialize tracing once per test binary; repeated calls are harmless.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "failguard=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// A three-service fleet with one critical member.
#[allow(dead_code)]
pub fn fleet_config() -> GuardConfig {
    let mut config = GuardConfig::default();
    config.services = vec![
        ServiceConfig {
            name: "ai-concierge".into(),
            critical: true,
            degraded_message: Some(
                "The concierge is offline. Please visit the information desk.".into(),
            ),
        },
        ServiceConfig {
            name: "wayfinding".into(),
            critical: false,
            degraded_message: None,
        },
        ServiceConfig {
            name: "baggage-tracker".into(),
            critical: false,
            degraded_message: None,
        },
    ];
    config
}

/// Collect every event already delivered to the subscriber.
#[allow(dead_code)]
pub fn drain_events(rx: &mut broadcast::Receiver<GuardEvent>) -> Vec<GuardEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
