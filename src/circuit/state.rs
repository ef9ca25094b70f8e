//! Per-service circuit state machine.

use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;

use crate::window::{ErrorWindow, SampleWindow};

/// Consecutive successes required in half-open before closing.
pub(crate) const HALF_OPEN_SUCCESS_TARGET: u32 = 3;

/// Upper bound of the degradation level scale.
pub const MAX_DEGRADATION_LEVEL: u8 = 5;

/// Protective state of a single service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation, requests pass through.
    Closed,
    /// Requests are rejected immediately and routed to fallback.
    Open,
    /// Probationary state allowing real requests through to test recovery.
    HalfOpen,
}

/// A state transition produced by a record/evaluate call.
///
/// The caller turns these into events and side effects (recovery timers,
/// emergency escalation) after releasing the service lock.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Opened { reason: String, failure_count: u32 },
    HalfOpened,
    Closed,
}

/// Per-service circuit: state, counters, and rolling sample windows.
#[derive(Debug)]
pub struct Circuit {
    pub state: CircuitState,
    pub failure_count: u32,
    /// Consecutive successes; meaningful only while half-open.
    pub success_count: u32,
    /// Monotonic count of calls admitted or rejected, never reset.
    pub total_requests: u64,
    pub last_failure_at: Option<Instant>,
    pub last_health_check: SystemTime,
    /// Sustained pressure indicator, clamped to [0,5].
    pub degradation_level: u8,
    /// Combined statistical deviation score in [0,1].
    pub anomaly_score: f64,
    pub responses: SampleWindow,
    pub errors: ErrorWindow,
}

impl Circuit {
    pub fn new(monitoring_window: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            total_requests: 0,
            last_failure_at: None,
            last_health_check: SystemTime::now(),
            degradation_level: 0,
            anomaly_score: 0.0,
            responses: SampleWindow::new(monitoring_window),
            errors: ErrorWindow::new(monitoring_window),
        }
    }

    /// Count one inbound call, admitted or not.
    pub fn note_request(&mut self) {
        self.total_requests += 1;
    }

    /// Record a successful operation.
    ///
    /// In half-open, enough consecutive successes close the circuit and reset
    /// failure and degradation counters.
    pub fn record_success(&mut self, now: Instant, response_time_ms: f64) -> Option<Transition> {
        self.responses.push(now, response_time_ms);

        if self.state == CircuitState::HalfOpen {
            self.success_count += 1;
            self.failure_count = 0;
            if self.success_count >= HALF_OPEN_SUCCESS_TARGET {
                return Some(self.close());
            }
        }
        None
    }

    /// Record a failed operation.
    ///
    /// Any half-open failure reopens the circuit; a closed circuit opens once
    /// `failure_threshold` consecutive failures accumulate.
    pub fn record_failure(
        &mut self,
        now: Instant,
        reason: &str,
        response_time_ms: f64,
        failure_threshold: u32,
    ) -> Option<Transition> {
        self.errors.push(now, reason.to_string(), response_time_ms);
        self.last_failure_at = Some(now);
        self.failure_count += 1;

        match self.state {
            CircuitState::HalfOpen => Some(self.open(reason)),
            CircuitState::Closed if self.failure_count >= failure_threshold => {
                Some(self.open(reason))
            }
            _ => None,
        }
    }

    /// Attempt the open → half-open recovery transition.
    ///
    /// Idempotent: a no-op unless the circuit is currently open, so the
    /// one-shot recovery timer and the periodic re-evaluation pass can race
    /// without double-transitioning.
    pub fn try_half_open(&mut self) -> Option<Transition> {
        if self.state != CircuitState::Open {
            return None;
        }
        self.state = CircuitState::HalfOpen;
        self.success_count = 0;
        Some(Transition::HalfOpened)
    }

    /// Force a closed circuit open, used when degradation saturates.
    pub fn force_open(&mut self, now: Instant, reason: &str) -> Option<Transition> {
        if self.state != CircuitState::Closed {
            return None;
        }
        self.last_failure_at = Some(now);
        Some(self.open(reason))
    }

    /// Whether the recovery timeout has elapsed since the last failure.
    pub fn recovery_due(&self, now: Instant, recovery_timeout: Duration) -> bool {
        match self.last_failure_at {
            Some(at) => now.duration_since(at) > recovery_timeout,
            None => true,
        }
    }

    pub fn raise_degradation(&mut self) {
        self.degradation_level = (self.degradation_level + 1).min(MAX_DEGRADATION_LEVEL);
    }

    pub fn lower_degradation(&mut self) {
        self.degradation_level = self.degradation_level.saturating_sub(1);
    }

    /// Store the combined anomaly score and adjust the degradation level.
    ///
    /// Returns true when the score breaches the configured threshold.
    pub fn apply_anomaly_score(&mut self, score: f64, threshold: f64) -> bool {
        self.anomaly_score = score;
        if score > threshold {
            self.raise_degradation();
            true
        } else {
            self.lower_degradation();
            false
        }
    }

    fn open(&mut self, reason: &str) -> Transition {
        self.state = CircuitState::Open;
        self.success_count = 0;
        Transition::Opened {
            reason: reason.to_string(),
            failure_count: self.failure_count,
        }
    }

    fn close(&mut self) -> Transition {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.success_count = 0;
        self.degradation_level = 0;
        Transition::Closed
    }
}
