//! Per-service metrics aggregation.
//!
//! # Data Flow
//! ```text
//! Request outcome recorded:
//!     → cumulative counters (request_count, error_count, total response time)
//!
//! Scheduled recompute (every 60s):
//!     → throughput (samples in trailing 60s)
//!     → error rate (error window / total requests)
//!     → availability percentage
//! ```
//!
//! # Design Decisions
//! - Cumulative counters live for the process lifetime; derived fields are
//!   refreshed on the metrics cadence
//! - Availability is clamped to [0,100] regardless of counter drift

use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;

use crate::window::{ErrorWindow, SampleWindow};

/// Trailing span used for throughput derivation.
pub const THROUGHPUT_WINDOW: Duration = Duration::from_secs(60);

/// Cumulative and derived metrics for a single service.
#[derive(Debug)]
pub struct ServiceMetrics {
    /// Total recorded outcomes (successes and failures).
    pub request_count: u64,
    /// Total recorded failures.
    pub error_count: u64,
    /// Sum of all observed response times, in milliseconds.
    pub total_response_time_ms: f64,
    /// Derived: total response time / request count.
    pub average_response_time_ms: f64,
    /// Derived: response samples within the trailing 60s.
    pub throughput: f64,
    /// Derived: error-window entries / total circuit requests.
    pub error_rate: f64,
    /// Derived percentage in [0,100].
    pub availability: f64,
    pub last_updated: SystemTime,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            request_count: 0,
            error_count: 0,
            total_response_time_ms: 0.0,
            average_response_time_ms: 0.0,
            throughput: 0.0,
            error_rate: 0.0,
            availability: 100.0,
            last_updated: SystemTime::now(),
        }
    }

    /// Record one completed request (success or failure) with its duration.
    pub fn record_request(&mut self, response_time_ms: f64) {
        self.request_count += 1;
        self.total_response_time_ms += response_time_ms;
        self.average_response_time_ms = self.total_response_time_ms / self.request_count as f64;
    }

    /// Record one failed request on top of [`record_request`](Self::record_request).
    pub fn record_error(&mut self) {
        self.error_count += 1;
    }

    /// Refresh the derived fields from the rolling windows.
    ///
    /// `total_requests` is the circuit's monotonic counter, which also counts
    /// calls rejected while the circuit was open.
    pub fn recompute(
        &mut self,
        now: Instant,
        total_requests: u64,
        responses: &SampleWindow,
        errors: &ErrorWindow,
    ) {
        self.throughput = responses.count_since(now, THROUGHPUT_WINDOW) as f64;
        self.average_response_time_ms = if self.request_count > 0 {
            self.total_response_time_ms / self.request_count as f64
        } else {
            0.0
        };

        let windowed_errors = errors.len() as u64;
        if total_requests == 0 {
            self.error_rate = 0.0;
            self.availability = 100.0;
        } else {
            self.error_rate = windowed_errors as f64 / total_requests as f64;
            let served = total_requests.saturating_sub(windowed_errors);
            self.availability = (served as f64 / total_requests as f64 * 100.0).clamp(0.0, 100.0);
        }
        self.last_updated = SystemTime::now();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            request_count: self.request_count,
            error_count: self.error_count,
            average_response_time_ms: self.average_response_time_ms,
            throughput: self.throughput,
            error_rate: self.error_rate,
            availability: self.availability,
            last_updated_ms: crate::events::unix_millis(self.last_updated),
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable, serializable view of [`ServiceMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub request_count: u64,
    pub error_count: u64,
    pub average_response_time_ms: f64,
    pub throughput: f64,
    pub error_rate: f64,
    pub availability: f64,
    pub last_updated_ms: u64,
}

/// Fleet-wide metrics aggregated across all registered services.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetrics {
    pub total_services: usize,
    pub healthy_services: usize,
    pub degraded_services: usize,
    pub failed_services: usize,
    pub overall_error_rate: f64,
    pub average_response_time_ms: f64,
    pub overall_availability: f64,
    pub total_requests: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn fresh_metrics_report_full_availability() {
        let metrics = ServiceMetrics::new();
        assert_eq!(metrics.request_count, 0);
        assert_eq!(metrics.error_rate, 0.0);
        assert_eq!(metrics.availability, 100.0);
    }

    #[test]
    fn average_tracks_cumulative_totals() {
        let mut metrics = ServiceMetrics::new();
        metrics.record_request(100.0);
        metrics.record_request(300.0);
        assert_eq!(metrics.average_response_time_ms, 200.0);
    }

    #[test]
    fn recompute_derives_rates_from_windows() {
        let window = Duration::from_secs(300);
        let mut responses = SampleWindow::new(window);
        let mut errors = ErrorWindow::new(window);
        let mut metrics = ServiceMetrics::new();
        let now = Instant::now();

        for _ in 0..8 {
            responses.push(now, 50.0);
            metrics.record_request(50.0);
        }
        errors.push(now, "boom".into(), 10.0);
        metrics.record_request(10.0);
        metrics.record_error();

        metrics.recompute(now, 10, &responses, &errors);
        assert_eq!(metrics.throughput, 8.0);
        assert_eq!(metrics.error_rate, 0.1);
        assert_eq!(metrics.availability, 90.0);
    }

    #[test]
    fn recompute_with_no_traffic_is_neutral() {
        let window = Duration::from_secs(300);
        let responses = SampleWindow::new(window);
        let errors = ErrorWindow::new(window);
        let mut metrics = ServiceMetrics::new();

        metrics.recompute(Instant::now(), 0, &responses, &errors);
        assert_eq!(metrics.throughput, 0.0);
        assert_eq!(metrics.error_rate, 0.0);
        assert_eq!(metrics.availability, 100.0);
    }
}
