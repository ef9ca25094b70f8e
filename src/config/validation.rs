//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds positive, rates within (0,1])
//! - Detect duplicate or empty service names
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before the config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::GuardConfig;

/// A single semantic problem found in a [`GuardConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    NoServices,
    EmptyServiceName,
    DuplicateService(String),
    ZeroFailureThreshold,
    ZeroRecoveryTimeout,
    ZeroMonitoringWindow,
    InvalidAnomalyThreshold(f64),
    InvalidErrorRateThreshold(f64),
    NonPositiveResponseTime,
    NonPositiveThroughput(f64),
    NonPositiveBaseline(f64),
    ZeroInterval(&'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::NoServices => write!(f, "at least one service must be registered"),
            ValidationError::EmptyServiceName => write!(f, "service names must be non-empty"),
            ValidationError::DuplicateService(name) => {
                write!(f, "duplicate service name: {name}")
            }
            ValidationError::ZeroFailureThreshold => {
                write!(f, "failure_threshold must be at least 1")
            }
            ValidationError::ZeroRecoveryTimeout => {
                write!(f, "recovery_timeout_secs must be positive")
            }
            ValidationError::ZeroMonitoringWindow => {
                write!(f, "monitoring_window_secs must be positive")
            }
            ValidationError::InvalidAnomalyThreshold(v) => {
                write!(f, "anomaly_threshold must be within (0,1], got {v}")
            }
            ValidationError::InvalidErrorRateThreshold(v) => {
                write!(f, "performance.error_rate must be within (0,1], got {v}")
            }
            ValidationError::NonPositiveResponseTime => {
                write!(f, "performance.response_time_ms must be positive")
            }
            ValidationError::NonPositiveThroughput(v) => {
                write!(f, "performance.throughput must be positive, got {v}")
            }
            ValidationError::NonPositiveBaseline(v) => {
                write!(f, "baseline.request_volume must be positive, got {v}")
            }
            ValidationError::ZeroInterval(task) => {
                write!(f, "scheduler.{task} must be positive")
            }
        }
    }
}

/// Check a deserialized config for semantic problems, collecting all of them.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.services.is_empty() {
        errors.push(ValidationError::NoServices);
    }
    let mut seen = HashSet::new();
    for service in &config.services {
        if service.name.is_empty() {
            errors.push(ValidationError::EmptyServiceName);
        } else if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
    }

    if config.failure_threshold == 0 {
        errors.push(ValidationError::ZeroFailureThreshold);
    }
    if config.recovery_timeout_secs == 0 {
        errors.push(ValidationError::ZeroRecoveryTimeout);
    }
    if config.monitoring_window_secs == 0 {
        errors.push(ValidationError::ZeroMonitoringWindow);
    }
    if !(config.anomaly_threshold > 0.0 && config.anomaly_threshold <= 1.0) {
        errors.push(ValidationError::InvalidAnomalyThreshold(
            config.anomaly_threshold,
        ));
    }
    if !(config.performance.error_rate > 0.0 && config.performance.error_rate <= 1.0) {
        errors.push(ValidationError::InvalidErrorRateThreshold(
            config.performance.error_rate,
        ));
    }
    if config.performance.response_time_ms == 0 {
        errors.push(ValidationError::NonPositiveResponseTime);
    }
    if config.performance.throughput <= 0.0 {
        errors.push(ValidationError::NonPositiveThroughput(
            config.performance.throughput,
        ));
    }
    if config.baseline.request_volume <= 0.0 {
        errors.push(ValidationError::NonPositiveBaseline(
            config.baseline.request_volume,
        ));
    }

    let scheduler = &config.scheduler;
    for (value, task) in [
        (scheduler.health_interval_secs, "health_interval_secs"),
        (scheduler.metrics_interval_secs, "metrics_interval_secs"),
        (scheduler.anomaly_interval_secs, "anomaly_interval_secs"),
        (
            scheduler.evaluation_interval_secs,
            "evaluation_interval_secs",
        ),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroInterval(task));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ServiceConfig;

    fn config_with_services() -> GuardConfig {
        GuardConfig {
            services: vec![ServiceConfig {
                name: "ai-concierge".into(),
                critical: true,
                degraded_message: None,
            }],
            ..GuardConfig::default()
        }
    }

    #[test]
    fn default_config_with_a_service_is_valid() {
        assert!(validate_config(&config_with_services()).is_ok());
    }

    #[test]
    fn empty_fleet_is_rejected() {
        let errors = validate_config(&GuardConfig::default()).unwrap_err();
        assert!(errors.contains(&ValidationError::NoServices));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = config_with_services();
        config.failure_threshold = 0;
        config.anomaly_threshold = 1.5;
        config.scheduler.evaluation_interval_secs = 0;
        config.services.push(ServiceConfig {
            name: "ai-concierge".into(),
            critical: false,
            degraded_message: None,
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::ZeroFailureThreshold));
        assert!(errors.contains(&ValidationError::InvalidAnomalyThreshold(1.5)));
        assert!(errors.contains(&ValidationError::ZeroInterval("evaluation_interval_secs")));
        assert!(errors.contains(&ValidationError::DuplicateService("ai-concierge".into())));
    }
}
