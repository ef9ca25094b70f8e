//! Error taxonomy for the safety layer.
//!
//! # Design Decisions
//! - Operation and fallback failures carry the caller's boxed error as source
//! - Timeouts are distinct from other operation failures
//! - Unknown service / unknown mechanism are configuration errors, never retried

use thiserror::Error;

use crate::failsafe::FailsafeLevel;

/// Boxed error type accepted from caller-supplied operations and fallbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the safety layer to calling services.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The service name was never registered at construction.
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// No failsafe mechanism registered at the requested tier.
    #[error("no {level} failsafe mechanism registered for service {service}")]
    UnknownMechanism {
        service: String,
        level: FailsafeLevel,
    },

    /// The wrapped operation exceeded the configured response-time limit.
    #[error("operation timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The wrapped operation returned an error.
    #[error("operation failed: {0}")]
    Operation(#[source] BoxError),

    /// The caller-supplied fallback itself failed. No further fallback layer.
    #[error("fallback failed: {0}")]
    Fallback(#[source] BoxError),
}
