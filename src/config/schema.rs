//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the safety
//! layer. All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the safety layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Consecutive failures before a closed circuit opens.
    pub failure_threshold: u32,

    /// Seconds to wait after opening before attempting half-open recovery.
    pub recovery_timeout_secs: u64,

    /// Rolling-window length for response-time and error samples, in seconds.
    pub monitoring_window_secs: u64,

    /// Combined anomaly score above which degradation pressure increases.
    pub anomaly_threshold: f64,

    /// Per-metric performance limits used by the degradation checks.
    pub performance: PerformanceThresholds,

    /// Expected traffic baseline used by the anomaly detector.
    pub baseline: BaselineConfig,

    /// Cadences for the four evaluation tasks.
    pub scheduler: SchedulerConfig,

    /// The fixed fleet of protected services.
    pub services: Vec<ServiceConfig>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 60,
            monitoring_window_secs: 300,
            anomaly_threshold: 0.8,
            performance: PerformanceThresholds::default(),
            baseline: BaselineConfig::default(),
            scheduler: SchedulerConfig::default(),
            services: Vec::new(),
        }
    }
}

impl GuardConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }

    pub fn monitoring_window(&self) -> Duration {
        Duration::from_secs(self.monitoring_window_secs)
    }
}

/// Performance limits; breaching one raises the degradation level.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PerformanceThresholds {
    /// Maximum acceptable response time in milliseconds; also the hard
    /// timeout applied to every wrapped operation.
    pub response_time_ms: u64,

    /// Maximum acceptable error rate (0..1).
    pub error_rate: f64,

    /// Minimum acceptable throughput, requests per trailing minute.
    pub throughput: f64,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            response_time_ms: 5_000,
            error_rate: 0.05,
            throughput: 100.0,
        }
    }
}

impl PerformanceThresholds {
    pub fn response_time(&self) -> Duration {
        Duration::from_millis(self.response_time_ms)
    }
}

/// Expected traffic volume per monitoring window.
///
/// The anomaly detector normalizes error counts and throughput against this
/// baseline; tune it to real traffic per deployment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub request_volume: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            request_volume: 100.0,
        }
    }
}

/// Cadences of the four independent evaluation tasks.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Health probe interval in seconds.
    pub health_interval_secs: u64,

    /// Metrics recompute interval in seconds.
    pub metrics_interval_secs: u64,

    /// Anomaly scan interval in seconds.
    pub anomaly_interval_secs: u64,

    /// Circuit state re-evaluation interval in seconds.
    pub evaluation_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            health_interval_secs: 30,
            metrics_interval_secs: 60,
            anomaly_interval_secs: 120,
            evaluation_interval_secs: 10,
        }
    }
}

/// One protected downstream service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Unique service name, the key for every public operation.
    pub name: String,

    /// Critical services trigger the emergency protocol when their circuit
    /// opens.
    #[serde(default)]
    pub critical: bool,

    /// Service-specific degraded-mode message; a generic one is used if absent.
    #[serde(default)]
    pub degraded_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = GuardConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.recovery_timeout_secs, 60);
        assert_eq!(config.monitoring_window_secs, 300);
        assert_eq!(config.anomaly_threshold, 0.8);
        assert_eq!(config.performance.response_time_ms, 5_000);
        assert_eq!(config.performance.error_rate, 0.05);
        assert_eq!(config.performance.throughput, 100.0);
        assert_eq!(config.baseline.request_volume, 100.0);
        assert_eq!(config.scheduler.health_interval_secs, 30);
        assert_eq!(config.scheduler.evaluation_interval_secs, 10);
    }

    #[test]
    fn minimal_toml_only_lists_services() {
        let config: GuardConfig = toml::from_str(
            r#"
            [[services]]
            name = "ai-concierge"
            critical = true

            [[services]]
            name = "baggage-tracker"
            "#,
        )
        .unwrap();
        assert_eq!(config.services.len(), 2);
        assert!(config.services[0].critical);
        assert!(!config.services[1].critical);
        assert_eq!(config.failure_threshold, 5);
    }
}
