//! Request-path tests for the safety layer.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use failguard::{
    CircuitState, FailsafeLevel, GuardError, GuardEvent, ServiceGuard,
};
use serde_json::json;

mod common;

#[tokio::test]
async fn unknown_service_is_a_configuration_error() {
    common::init_tracing();
    let guard = ServiceGuard::new(common::fleet_config()).unwrap();

    let err = guard
        .execute("parking", || async { Ok(json!({"ok": true})) })
        .await
        .unwrap_err();
    assert!(matches!(err, GuardError::UnknownService(name) if name == "parking"));
    assert!(guard.circuit_status("parking").is_none());
}

#[tokio::test]
async fn fresh_circuit_status_round_trip() {
    let guard = ServiceGuard::new(common::fleet_config()).unwrap();

    let status = guard.circuit_status("wayfinding").unwrap();
    assert_eq!(status.state, CircuitState::Closed);
    assert_eq!(status.failure_count, 0);
    assert_eq!(status.success_count, 0);
    assert_eq!(status.total_requests, 0);
    assert_eq!(status.degradation_level, 0);
    assert_eq!(status.metrics.request_count, 0);
    assert_eq!(status.metrics.availability, 100.0);

    let all = guard.all_circuit_statuses();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn success_returns_the_operation_result() {
    let guard = ServiceGuard::new(common::fleet_config()).unwrap();

    let value = guard
        .execute("wayfinding", || async {
            Ok(json!({"route": ["gate A", "gate B"]}))
        })
        .await
        .unwrap();
    assert_eq!(value["route"][0], "gate A");

    let status = guard.circuit_status("wayfinding").unwrap();
    assert_eq!(status.total_requests, 1);
    assert_eq!(status.metrics.request_count, 1);
    assert_eq!(status.metrics.error_count, 0);
}

#[tokio::test]
async fn open_circuit_never_invokes_the_operation() {
    common::init_tracing();
    let mut config = common::fleet_config();
    config.failure_threshold = 2;
    let guard = ServiceGuard::new(config).unwrap();
    let mut events = guard.subscribe();

    let calls = Arc::new(AtomicU32::new(0));
    let failing_op = |calls: Arc<AtomicU32>| {
        move || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("backend exploded ({n})").into())
            }
        }
    };

    // Two failures trip the threshold-2 circuit.
    for _ in 0..2 {
        let err = guard
            .execute("ai-concierge", failing_op(calls.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::Operation(_)));
    }
    let status = guard.circuit_status("ai-concierge").unwrap();
    assert_eq!(status.state, CircuitState::Open);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Third call resolves from the default payload without touching the stub.
    let payload = guard
        .execute("ai-concierge", failing_op(calls.clone()))
        .await
        .unwrap();
    assert_eq!(payload["status"], "degraded");
    assert_eq!(
        payload["message"],
        "The concierge is offline. Please visit the information desk."
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(guard.circuit_status("ai-concierge").unwrap().total_requests, 3);

    // The opening event carries the tripping call's error, and the critical
    // flag escalates to the emergency protocol.
    let events = common::drain_events(&mut events);
    let opened = events
        .iter()
        .find_map(|e| match e {
            GuardEvent::CircuitOpened {
                error,
                failure_count,
                ..
            } => Some((error.clone(), *failure_count)),
            _ => None,
        })
        .expect("circuit_opened event");
    assert!(opened.0.contains("backend exploded (2)"));
    assert_eq!(opened.1, 2);
    assert!(events
        .iter()
        .any(|e| matches!(e, GuardEvent::EmergencyProtocol { severity, .. } if severity == "critical")));
}

#[tokio::test]
async fn fifth_failure_error_is_attached_to_the_open_event() {
    let guard = ServiceGuard::new(common::fleet_config()).unwrap();
    let mut events = guard.subscribe();

    for n in 1..=5 {
        let _ = guard
            .execute("wayfinding", move || async move {
                Err(format!("boom-{n}").into())
            })
            .await;
    }

    let events = common::drain_events(&mut events);
    match events.as_slice() {
        [GuardEvent::CircuitOpened {
            service,
            error,
            failure_count,
        }] => {
            assert_eq!(service, "wayfinding");
            assert_eq!(error, "boom-5");
            assert_eq!(*failure_count, 5);
        }
        other => panic!("expected a single circuit_opened event, got {other:?}"),
    }
}

#[tokio::test]
async fn fallback_resolves_operation_failures() {
    let guard = ServiceGuard::new(common::fleet_config()).unwrap();

    let value = guard
        .execute_with_fallback(
            "baggage-tracker",
            || async { Err("carousel feed down".into()) },
            || async { Ok(json!({"belt": "unknown", "cached": true})) },
        )
        .await
        .unwrap();
    assert_eq!(value["cached"], true);

    // The failure is still recorded against the circuit.
    let status = guard.circuit_status("baggage-tracker").unwrap();
    assert_eq!(status.failure_count, 1);
    assert_eq!(status.metrics.error_count, 1);
}

#[tokio::test]
async fn fallback_failure_propagates_with_no_further_layer() {
    let guard = ServiceGuard::new(common::fleet_config()).unwrap();

    let err = guard
        .execute_with_fallback(
            "baggage-tracker",
            || async { Err("carousel feed down".into()) },
            || async { Err("fallback cache empty".into()) },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GuardError::Fallback(_)));
}

#[tokio::test]
async fn open_circuit_prefers_the_caller_fallback() {
    let mut config = common::fleet_config();
    config.failure_threshold = 1;
    let guard = ServiceGuard::new(config).unwrap();

    let _ = guard
        .execute("wayfinding", || async { Err("down".into()) })
        .await;
    assert_eq!(
        guard.circuit_status("wayfinding").unwrap().state,
        CircuitState::Open
    );

    let value = guard
        .execute_with_fallback(
            "wayfinding",
            || async { Ok(json!({"unreachable": true})) },
            || async { Ok(json!({"static_map": true})) },
        )
        .await
        .unwrap();
    assert_eq!(value["static_map"], true);
}

#[tokio::test]
async fn slow_operations_time_out_and_count_as_failures() {
    let mut config = common::fleet_config();
    config.performance.response_time_ms = 50;
    let guard = ServiceGuard::new(config).unwrap();

    let err = guard
        .execute("wayfinding", || async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(json!({"late": true}))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GuardError::Timeout { elapsed_ms: 50 }));

    let status = guard.circuit_status("wayfinding").unwrap();
    assert_eq!(status.failure_count, 1);
    assert_eq!(status.metrics.error_count, 1);
}

#[tokio::test]
async fn failsafe_tiers_resolve_for_registered_services() {
    let guard = ServiceGuard::new(common::fleet_config()).unwrap();

    let plan = guard
        .activate_failsafe("ai-concierge", FailsafeLevel::Emergency)
        .unwrap();
    assert_eq!(plan.action, "manual-operation");

    let err = guard
        .activate_failsafe("parking", FailsafeLevel::Primary)
        .unwrap_err();
    assert!(matches!(err, GuardError::UnknownMechanism { .. }));
}

#[tokio::test]
async fn dashboard_aggregates_across_the_fleet() {
    let mut config = common::fleet_config();
    config.failure_threshold = 1;
    let guard = ServiceGuard::new(config).unwrap();

    let _ = guard
        .execute("wayfinding", || async { Ok(json!({"ok": true})) })
        .await;
    let _ = guard
        .execute("baggage-tracker", || async { Err("down".into()) })
        .await;

    let dashboard = guard.dashboard_metrics();
    assert_eq!(dashboard.total_services, 3);
    assert_eq!(dashboard.failed_services, 1);
    assert_eq!(dashboard.total_requests, 2);
    assert_eq!(dashboard.overall_error_rate, 0.5);
    assert_eq!(dashboard.overall_availability, 50.0);
}
