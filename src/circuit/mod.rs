//! Circuit subsystem.
//!
//! # State Transitions
//! ```text
//! Closed → Open:      failure_count >= failure_threshold, or degradation
//!                     level saturated during a Closed-state evaluation pass
//! Open → Half-Open:   recovery timeout elapsed (one-shot timer or the
//!                     periodic re-evaluation pass; both idempotent)
//! Half-Open → Closed: 3 consecutive successes
//! Half-Open → Open:   any failure
//! ```
//!
//! # Design Decisions
//! - Per-service circuit, never global
//! - Open state fails fast; only fallback/default payloads are served
//! - Counters reset on state transition

pub mod state;

pub use state::{Circuit, CircuitState, Transition, MAX_DEGRADATION_LEVEL};
