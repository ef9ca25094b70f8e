//! failguard — runtime safety layer for a fleet of downstream services.
//!
//! Wraps every call to a downstream service with failure accounting,
//! statistical anomaly detection, and tiered fallback, moving each service's
//! circuit between CLOSED, OPEN, and HALF_OPEN without operator intervention.
//!
//! # Architecture Overview
//!
//! ```text
//! Caller ──▶ ServiceGuard::execute ──▶ circuit state machine
//!                │                         │
//!                │ admitted                │ open: fallback / default payload
//!                ▼                         ▼
//!          operation (hard timeout)   failsafe manager
//!                │
//!                ▼
//!          rolling windows ──▶ metrics aggregator ──▶ anomaly detector
//!
//! Evaluation scheduler (independent timers, shared shutdown):
//!     health probe · metrics recompute · anomaly scan · state re-evaluation
//! ```
//!
//! All state is in-memory for the life of the process; the fleet of protected
//! services is fixed configuration supplied at construction.

// Core subsystems
pub mod circuit;
pub mod config;
pub mod guard;
pub mod window;

// Analysis
pub mod anomaly;
pub mod metrics;

// Failure handling
pub mod error;
pub mod failsafe;

// Cross-cutting concerns
pub mod events;
pub mod health;
pub mod lifecycle;
pub mod scheduler;

pub use circuit::{CircuitState, MAX_DEGRADATION_LEVEL};
pub use config::{load_config, ConfigError, GuardConfig, ServiceConfig};
pub use error::{BoxError, GuardError};
pub use events::GuardEvent;
pub use failsafe::{FailsafeLevel, FailsafePlan};
pub use guard::{CircuitStatus, ServiceGuard, ServiceResponse};
pub use health::{AlwaysHealthy, HealthCheck};
pub use lifecycle::Shutdown;
pub use metrics::{DashboardMetrics, MetricsSnapshot};
pub use scheduler::EvaluatorHandles;
