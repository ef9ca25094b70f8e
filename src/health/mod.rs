//! Pluggable health checking.
//!
//! # Responsibilities
//! - Define the probe contract the evaluation scheduler drives every 30s
//! - Provide a permissive default for deployments without a real probe
//!
//! # Design Decisions
//! - The collaborator is a trait object supplied at construction; the safety
//!   layer owns the cadence, not the probe logic
//! - A negative probe while a circuit is closed is recorded as an ordinary
//!   failure with zero response time, and never raised to any caller

use async_trait::async_trait;

/// Probe contract for downstream service health.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Return whether the named service currently looks healthy.
    async fn check(&self, service: &str) -> bool;
}

/// Default probe that reports every service healthy.
///
/// Keeps the health pass inert until a real collaborator is plugged in.
#[derive(Debug, Default)]
pub struct AlwaysHealthy;

#[async_trait]
impl HealthCheck for AlwaysHealthy {
    async fn check(&self, _service: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_probe_reports_healthy() {
        let probe = AlwaysHealthy;
        assert!(probe.check("ai-concierge").await);
    }
}
