//! The safety-layer facade.
//!
//! # Data Flow
//! ```text
//! Caller:
//!     execute(service, operation[, fallback])
//!     → circuit admits or rejects
//!     → operation under hard timeout
//!     → outcome recorded into windows + metrics
//!     → fallback / default payload on failure or open circuit
//!
//! Evaluation scheduler (independent of request flow):
//!     health probe / metrics recompute / anomaly scan / state re-evaluation
//! ```
//!
//! # Design Decisions
//! - Sharded lock table: a fixed `DashMap` of services, each entry guarding
//!   its Circuit/Metrics pair with its own mutex, so scheduler passes never
//!   starve live traffic on unrelated services
//! - Locks are held only for synchronous read-modify-write sections; the
//!   operation future, health probes, and event emission run outside them
//! - The timeout race drops the losing future; recording happens strictly
//!   after the race resolves, so a late result cannot mutate state

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Instant, SystemTime};

use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::anomaly;
use crate::circuit::{Circuit, CircuitState, Transition, MAX_DEGRADATION_LEVEL};
use crate::config::{validate_config, ConfigError, GuardConfig};
use crate::error::{BoxError, GuardError};
use crate::events::{unix_millis, EventBus, GuardEvent};
use crate::failsafe::{self, FailsafeLevel, FailsafeManager, FailsafePlan};
use crate::health::{AlwaysHealthy, HealthCheck};
use crate::lifecycle::Shutdown;
use crate::metrics::{DashboardMetrics, MetricsSnapshot, ServiceMetrics};
use crate::scheduler::{self, EvaluatorHandles};

/// Payload type flowing through operations, fallbacks, and default responses.
pub type ServiceResponse = Value;

/// Point-in-time view of one service's circuit.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitStatus {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub total_requests: u64,
    pub degradation_level: u8,
    pub anomaly_score: f64,
    pub last_health_check_ms: u64,
    pub metrics: MetricsSnapshot,
}

/// Circuit and metrics for one service, guarded as a pair.
pub(crate) struct ServiceState {
    pub(crate) circuit: Circuit,
    pub(crate) metrics: ServiceMetrics,
}

pub(crate) struct ServiceEntry {
    pub(crate) name: String,
    pub(crate) critical: bool,
    state: Mutex<ServiceState>,
}

impl ServiceEntry {
    fn lock(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().expect("service state mutex poisoned")
    }
}

enum Admission {
    Pass,
    Rejected(ServiceResponse),
}

/// Shared state behind the [`ServiceGuard`] facade and the scheduler tasks.
pub(crate) struct GuardCore {
    me: Weak<GuardCore>,
    pub(crate) config: GuardConfig,
    services: DashMap<String, Arc<ServiceEntry>>,
    events: EventBus,
    failsafe: FailsafeManager,
    health: Arc<dyn HealthCheck>,
    pub(crate) shutdown: Shutdown,
}

impl GuardCore {
    fn entry(&self, service: &str) -> Result<Arc<ServiceEntry>, GuardError> {
        self.services
            .get(service)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| GuardError::UnknownService(service.to_string()))
    }

    /// Count the call and decide whether it may reach the operation.
    fn admit(&self, entry: &ServiceEntry) -> Admission {
        let mut state = entry.lock();
        state.circuit.note_request();
        if state.circuit.state == CircuitState::Open {
            drop(state);
            tracing::debug!(service = %entry.name, "circuit open, rejecting request");
            let payload = self
                .failsafe
                .default_fallback(&entry.name)
                .unwrap_or_else(|| json!({ "service": entry.name, "status": "degraded" }));
            Admission::Rejected(payload)
        } else {
            Admission::Pass
        }
    }

    fn on_success(&self, entry: &Arc<ServiceEntry>, response_time_ms: f64) {
        let now = Instant::now();
        let mut state = entry.lock();
        let ServiceState { circuit, metrics } = &mut *state;

        metrics.record_request(response_time_ms);
        let transition = circuit.record_success(now, response_time_ms);

        // Per-request degradation checks; each fires independently and may
        // stack on a single sample.
        let perf = &self.config.performance;
        if response_time_ms > perf.response_time_ms as f64 {
            circuit.raise_degradation();
        }
        if metrics.error_rate > perf.error_rate {
            circuit.raise_degradation();
        }
        if metrics.throughput < perf.throughput {
            circuit.raise_degradation();
        }
        drop(state);

        if matches!(transition, Some(Transition::Closed)) {
            tracing::info!(service = %entry.name, "circuit closed after successful probation");
            self.events.emit(GuardEvent::CircuitClosed {
                service: entry.name.clone(),
            });
        }
    }

    fn on_failure(&self, entry: &Arc<ServiceEntry>, reason: &str, response_time_ms: f64) {
        let now = Instant::now();
        let mut state = entry.lock();
        let ServiceState { circuit, metrics } = &mut *state;

        metrics.record_request(response_time_ms);
        metrics.record_error();
        let transition =
            circuit.record_failure(now, reason, response_time_ms, self.config.failure_threshold);
        drop(state);

        if let Some(Transition::Opened {
            reason,
            failure_count,
        }) = transition
        {
            self.handle_open(entry, &reason, failure_count);
        }
    }

    fn handle_open(&self, entry: &Arc<ServiceEntry>, reason: &str, failure_count: u32) {
        tracing::warn!(
            service = %entry.name,
            failure_count,
            reason,
            "circuit opened"
        );
        self.events.emit(GuardEvent::CircuitOpened {
            service: entry.name.clone(),
            error: reason.to_string(),
            failure_count,
        });
        self.schedule_recovery(entry.name.clone());

        if entry.critical {
            tracing::error!(service = %entry.name, reason, "emergency protocol activated");
            self.events.emit(failsafe::emergency_event(&entry.name, reason));
        }
    }

    /// One-shot recovery timer for a freshly opened circuit.
    fn schedule_recovery(&self, service: String) {
        let Some(core) = self.me.upgrade() else {
            return;
        };
        let delay = self.config.recovery_timeout();
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    core.attempt_recovery(&service);
                }
                _ = shutdown.recv() => {}
            }
        });
    }

    /// Idempotent open → half-open attempt; a no-op for any other state.
    pub(crate) fn attempt_recovery(&self, service: &str) {
        let Ok(entry) = self.entry(service) else {
            return;
        };
        let mut state = entry.lock();
        let transition = state.circuit.try_half_open();
        drop(state);

        if transition.is_some() {
            tracing::info!(service = %entry.name, "circuit half-open, probing recovery");
            self.events.emit(GuardEvent::CircuitHalfOpen {
                service: entry.name.clone(),
            });
        }
    }

    /// Probe every service; a negative result on a closed circuit is an
    /// ordinary recorded failure with zero response time.
    pub(crate) async fn run_health_pass(&self) {
        let entries: Vec<Arc<ServiceEntry>> = self
            .services
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();

        for entry in entries {
            let healthy = self.health.check(&entry.name).await;
            let mut state = entry.lock();
            state.circuit.last_health_check = SystemTime::now();
            let closed = state.circuit.state == CircuitState::Closed;
            drop(state);

            if !healthy && closed {
                tracing::warn!(service = %entry.name, "health check failed");
                self.on_failure(&entry, "health check failed", 0.0);
            }
        }
    }

    /// Refresh derived metrics from the rolling windows.
    pub(crate) fn run_metrics_pass(&self) {
        let now = Instant::now();
        for entry in self.services.iter() {
            let mut state = entry.value().lock();
            let ServiceState { circuit, metrics } = &mut *state;
            circuit.responses.prune(now);
            circuit.errors.prune(now);
            metrics.recompute(now, circuit.total_requests, &circuit.responses, &circuit.errors);
        }
    }

    /// Re-score every service and adjust degradation pressure.
    pub(crate) fn run_anomaly_pass(&self) {
        let now = Instant::now();
        let baseline = self.config.baseline.request_volume;
        let mut detected = Vec::new();

        for entry in self.services.iter() {
            let entry = entry.value();
            let mut state = entry.lock();
            let ServiceState { circuit, metrics } = &mut *state;
            circuit.responses.prune(now);
            circuit.errors.prune(now);

            let report = anomaly::analyze(
                &circuit.responses.values(),
                circuit.errors.count_since(now, anomaly::ERROR_SCAN_WINDOW),
                metrics.throughput,
                baseline,
            );
            let score = report.combined();
            let anomalous = circuit.apply_anomaly_score(score, self.config.anomaly_threshold);
            let degradation_level = circuit.degradation_level;
            drop(state);

            if anomalous {
                tracing::warn!(
                    service = %entry.name,
                    anomaly_score = score,
                    degradation_level,
                    "anomaly detected"
                );
                detected.push(GuardEvent::AnomalyDetected {
                    service: entry.name.clone(),
                    anomaly_score: score,
                    details: report.details(),
                });
            }
        }

        for event in detected {
            self.events.emit(event);
        }
    }

    /// Drive recovery for open circuits and force saturated ones open.
    pub(crate) fn run_evaluation_pass(&self) {
        let now = Instant::now();
        let recovery_timeout = self.config.recovery_timeout();
        let entries: Vec<Arc<ServiceEntry>> = self
            .services
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();

        for entry in entries {
            let state = entry.lock();
            let circuit_state = state.circuit.state;
            let recovery_due = state.circuit.recovery_due(now, recovery_timeout);
            let saturated = state.circuit.degradation_level >= MAX_DEGRADATION_LEVEL;
            drop(state);

            match circuit_state {
                CircuitState::Open if recovery_due => {
                    self.attempt_recovery(&entry.name);
                }
                CircuitState::Closed if saturated => {
                    let mut state = entry.lock();
                    let transition = state
                        .circuit
                        .force_open(now, "sustained degradation at maximum level");
                    drop(state);
                    if let Some(Transition::Opened {
                        reason,
                        failure_count,
                    }) = transition
                    {
                        self.handle_open(&entry, &reason, failure_count);
                    }
                }
                _ => {}
            }
        }
    }

}

/// Runtime safety layer protecting a fixed fleet of downstream services.
///
/// Cheap to clone via its inner `Arc`; all clones share the same circuits.
#[derive(Clone)]
pub struct ServiceGuard {
    core: Arc<GuardCore>,
}

impl ServiceGuard {
    /// Build a guard with the permissive default health probe.
    pub fn new(config: GuardConfig) -> Result<Self, ConfigError> {
        Self::with_health_check(config, Arc::new(AlwaysHealthy))
    }

    /// Build a guard with a caller-supplied health probe.
    pub fn with_health_check(
        config: GuardConfig,
        health: Arc<dyn HealthCheck>,
    ) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let services = DashMap::new();
        for service in &config.services {
            services.insert(
                service.name.clone(),
                Arc::new(ServiceEntry {
                    name: service.name.clone(),
                    critical: service.critical,
                    state: Mutex::new(ServiceState {
                        circuit: Circuit::new(config.monitoring_window()),
                        metrics: ServiceMetrics::new(),
                    }),
                }),
            );
        }
        let failsafe = FailsafeManager::from_services(&config.services);

        tracing::info!(
            services = config.services.len(),
            failure_threshold = config.failure_threshold,
            recovery_timeout_secs = config.recovery_timeout_secs,
            "safety layer initialized"
        );

        let core = Arc::new_cyclic(|me| GuardCore {
            me: me.clone(),
            config,
            services,
            events: EventBus::new(),
            failsafe,
            health,
            shutdown: Shutdown::new(),
        });
        Ok(Self { core })
    }

    /// Run `operation` under the circuit for `service`.
    ///
    /// An open circuit resolves to the service's static default payload
    /// without invoking the operation. Operation errors and timeouts are
    /// recorded and propagated.
    pub async fn execute<Op, Fut>(
        &self,
        service: &str,
        operation: Op,
    ) -> Result<ServiceResponse, GuardError>
    where
        Op: FnOnce() -> Fut,
        Fut: Future<Output = Result<ServiceResponse, BoxError>>,
    {
        let entry = self.core.entry(service)?;
        match self.core.admit(&entry) {
            Admission::Rejected(payload) => Ok(payload),
            Admission::Pass => self.run_guarded(&entry, operation).await,
        }
    }

    /// Like [`execute`](Self::execute), with a lazy caller fallback.
    ///
    /// The fallback resolves open-circuit rejections and failed operations;
    /// an error from the fallback itself propagates with no further layer.
    pub async fn execute_with_fallback<Op, OpFut, Fb, FbFut>(
        &self,
        service: &str,
        operation: Op,
        fallback: Fb,
    ) -> Result<ServiceResponse, GuardError>
    where
        Op: FnOnce() -> OpFut,
        OpFut: Future<Output = Result<ServiceResponse, BoxError>>,
        Fb: FnOnce() -> FbFut,
        FbFut: Future<Output = Result<ServiceResponse, BoxError>>,
    {
        let entry = self.core.entry(service)?;
        match self.core.admit(&entry) {
            Admission::Rejected(_) => fallback().await.map_err(GuardError::Fallback),
            Admission::Pass => match self.run_guarded(&entry, operation).await {
                Ok(value) => Ok(value),
                Err(err) => {
                    tracing::debug!(service, error = %err, "resolving through fallback");
                    fallback().await.map_err(GuardError::Fallback)
                }
            },
        }
    }

    async fn run_guarded<Op, Fut>(
        &self,
        entry: &Arc<ServiceEntry>,
        operation: Op,
    ) -> Result<ServiceResponse, GuardError>
    where
        Op: FnOnce() -> Fut,
        Fut: Future<Output = Result<ServiceResponse, BoxError>>,
    {
        let limit = self.core.config.performance.response_time();
        let started = Instant::now();

        match tokio::time::timeout(limit, operation()).await {
            Ok(Ok(value)) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.core.on_success(entry, elapsed_ms);
                Ok(value)
            }
            Ok(Err(err)) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.core.on_failure(entry, &err.to_string(), elapsed_ms);
                Err(GuardError::Operation(err))
            }
            Err(_) => {
                // The operation future is dropped here; a late result can no
                // longer reach the circuit.
                let elapsed_ms = limit.as_millis() as u64;
                self.core.on_failure(
                    entry,
                    &format!("timeout after {elapsed_ms}ms"),
                    elapsed_ms as f64,
                );
                Err(GuardError::Timeout { elapsed_ms })
            }
        }
    }

    /// Snapshot one service's circuit, or `None` for an unknown name.
    pub fn circuit_status(&self, service: &str) -> Option<CircuitStatus> {
        let entry = self.core.entry(service).ok()?;
        let state = entry.lock();
        Some(CircuitStatus {
            state: state.circuit.state,
            failure_count: state.circuit.failure_count,
            success_count: state.circuit.success_count,
            total_requests: state.circuit.total_requests,
            degradation_level: state.circuit.degradation_level,
            anomaly_score: state.circuit.anomaly_score,
            last_health_check_ms: unix_millis(state.circuit.last_health_check),
            metrics: state.metrics.snapshot(),
        })
    }

    /// Snapshot every registered service.
    pub fn all_circuit_statuses(&self) -> HashMap<String, CircuitStatus> {
        self.core
            .services
            .iter()
            .filter_map(|e| {
                self.circuit_status(e.key())
                    .map(|status| (e.key().clone(), status))
            })
            .collect()
    }

    /// Fleet-wide aggregate, computed on demand.
    pub fn dashboard_metrics(&self) -> DashboardMetrics {
        let mut total_services = 0;
        let mut healthy = 0;
        let mut degraded = 0;
        let mut failed = 0;
        let mut requests: u64 = 0;
        let mut errors: u64 = 0;
        let mut recorded: u64 = 0;
        let mut total_response_time = 0.0;

        for entry in self.core.services.iter() {
            let state = entry.value().lock();
            total_services += 1;
            match state.circuit.state {
                CircuitState::Open => failed += 1,
                CircuitState::HalfOpen => degraded += 1,
                CircuitState::Closed if state.circuit.degradation_level >= 3 => degraded += 1,
                CircuitState::Closed => healthy += 1,
            }
            requests += state.circuit.total_requests;
            recorded += state.metrics.request_count;
            errors += state.metrics.error_count;
            total_response_time += state.metrics.total_response_time_ms;
        }

        let overall_error_rate = if recorded > 0 {
            errors as f64 / recorded as f64
        } else {
            0.0
        };
        let average_response_time_ms = if recorded > 0 {
            total_response_time / recorded as f64
        } else {
            0.0
        };
        let overall_availability = if recorded > 0 {
            ((recorded - errors) as f64 / recorded as f64 * 100.0).clamp(0.0, 100.0)
        } else {
            100.0
        };

        DashboardMetrics {
            total_services,
            healthy_services: healthy,
            degraded_services: degraded,
            failed_services: failed,
            overall_error_rate,
            average_response_time_ms,
            overall_availability,
            total_requests: requests,
        }
    }

    /// Resolve the named failsafe tier registered for a service.
    pub fn activate_failsafe(
        &self,
        service: &str,
        level: FailsafeLevel,
    ) -> Result<FailsafePlan, GuardError> {
        self.core.failsafe.activate(service, level)
    }

    /// The static degraded-mode payload for a service, if registered.
    pub fn default_fallback(&self, service: &str) -> Option<ServiceResponse> {
        self.core.failsafe.default_fallback(service)
    }

    /// Subscribe to circuit and anomaly events.
    pub fn subscribe(&self) -> broadcast::Receiver<GuardEvent> {
        self.core.events.subscribe()
    }

    /// Spawn the four periodic evaluation tasks. Call once.
    pub fn start(&self) -> EvaluatorHandles {
        scheduler::spawn(Arc::clone(&self.core))
    }

    /// Stop all evaluation tasks and pending recovery timers.
    pub fn shutdown(&self) {
        self.core.shutdown.trigger();
    }
}
