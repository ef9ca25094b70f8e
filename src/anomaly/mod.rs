//! Statistical anomaly detection.
//!
//! # Responsibilities
//! - Score each service 0..1 on three independent signals: latency deviation,
//!   error-rate deviation, and throughput deviation
//! - Combine signals via maximum into a single anomaly score
//!
//! # Design Decisions
//! - Scores are advisory; they adjust the degradation level and emit events
//!   but are never raised as errors
//! - The baseline request volume is configuration, not a constant, since its
//!   correctness depends on real traffic per deployment
//! - Standard deviation uses a floor divisor of 1 to avoid division by zero

use std::time::Duration;

use serde_json::{json, Value};

/// Z-score divisor for the latency signal.
const LATENCY_SENSITIVITY: f64 = 2.0;

/// Samples treated as "recent" when splitting the latency window.
const RECENT_SAMPLE_COUNT: usize = 10;

/// Minimum samples before the latency signal produces a score.
const MIN_LATENCY_SAMPLES: usize = 10;

/// Error-rate threshold the observed windowed rate is normalized against.
const ERROR_RATE_CEILING: f64 = 0.05;

/// Trailing span scanned for the error-rate signal.
pub const ERROR_SCAN_WINDOW: Duration = Duration::from_secs(300);

/// Score above which the latency or error-rate signal counts as anomalous.
pub const SIGNAL_THRESHOLD: f64 = 0.7;

/// Score above which the throughput signal counts as anomalous.
pub const THROUGHPUT_SIGNAL_THRESHOLD: f64 = 0.5;

/// Component scores for one service, combined by maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyReport {
    pub latency_score: f64,
    pub error_rate_score: f64,
    pub throughput_score: f64,
}

impl AnomalyReport {
    pub fn combined(&self) -> f64 {
        self.latency_score
            .max(self.error_rate_score)
            .max(self.throughput_score)
    }

    pub fn details(&self) -> Value {
        json!({
            "latency_score": self.latency_score,
            "latency_anomalous": self.latency_score > SIGNAL_THRESHOLD,
            "error_rate_score": self.error_rate_score,
            "error_rate_anomalous": self.error_rate_score > SIGNAL_THRESHOLD,
            "throughput_score": self.throughput_score,
            "throughput_anomalous": self.throughput_score > THROUGHPUT_SIGNAL_THRESHOLD,
        })
    }
}

/// Score one service from its current window contents.
///
/// `response_times` is the rolling response-time window in arrival order,
/// `recent_errors` the error count within [`ERROR_SCAN_WINDOW`], and
/// `throughput` the most recently derived trailing-60s sample count.
pub fn analyze(
    response_times: &[f64],
    recent_errors: usize,
    throughput: f64,
    baseline_volume: f64,
) -> AnomalyReport {
    AnomalyReport {
        latency_score: latency_score(response_times),
        error_rate_score: error_rate_score(recent_errors, baseline_volume),
        throughput_score: throughput_score(throughput, baseline_volume),
    }
}

/// Z-score of the most recent samples against the historical remainder.
pub fn latency_score(response_times: &[f64]) -> f64 {
    if response_times.len() < MIN_LATENCY_SAMPLES {
        return 0.0;
    }
    let split = response_times.len() - RECENT_SAMPLE_COUNT;
    let (historical, recent) = response_times.split_at(split);
    if historical.is_empty() {
        return 0.0;
    }

    let recent_mean = mean(recent);
    let historical_mean = mean(historical);
    let divisor = stddev(historical).max(1.0);
    let z = (recent_mean - historical_mean).abs() / divisor;
    (z / LATENCY_SENSITIVITY).min(1.0)
}

/// Windowed error count normalized against the baseline request volume.
pub fn error_rate_score(recent_errors: usize, baseline_volume: f64) -> f64 {
    if baseline_volume <= 0.0 {
        return 0.0;
    }
    let observed_rate = recent_errors as f64 / baseline_volume;
    (observed_rate / ERROR_RATE_CEILING).min(1.0)
}

/// Relative deviation of current throughput from the expected baseline.
pub fn throughput_score(current: f64, expected: f64) -> f64 {
    if expected <= 0.0 {
        return 0.0;
    }
    ((current - expected).abs() / expected).min(1.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_needs_enough_samples() {
        let samples = vec![100.0; 9];
        assert_eq!(latency_score(&samples), 0.0);
    }

    #[test]
    fn latency_without_history_scores_zero() {
        // Exactly 10 samples: all recent, nothing historical.
        let samples = vec![100.0; 10];
        assert_eq!(latency_score(&samples), 0.0);
    }

    #[test]
    fn latency_spike_scores_above_signal_threshold() {
        // Ten ~100ms samples followed by two ~3000ms samples: the recent split
        // averages far above the flat historical baseline.
        let mut samples = vec![100.0; 10];
        samples.extend([3000.0, 3000.0]);
        let score = latency_score(&samples);
        assert!(score > SIGNAL_THRESHOLD, "score was {score}");
    }

    #[test]
    fn steady_latency_is_not_anomalous() {
        let samples: Vec<f64> = (0..30).map(|i| 100.0 + (i % 5) as f64).collect();
        assert!(latency_score(&samples) < SIGNAL_THRESHOLD);
    }

    #[test]
    fn error_rate_saturates_at_one() {
        assert_eq!(error_rate_score(0, 100.0), 0.0);
        assert!((error_rate_score(3, 100.0) - 0.6).abs() < 1e-9);
        assert_eq!(error_rate_score(50, 100.0), 1.0);
    }

    #[test]
    fn throughput_deviation_is_symmetric() {
        assert_eq!(throughput_score(100.0, 100.0), 0.0);
        assert!((throughput_score(40.0, 100.0) - 0.6).abs() < 1e-9);
        assert!((throughput_score(160.0, 100.0) - 0.6).abs() < 1e-9);
        assert_eq!(throughput_score(300.0, 100.0), 1.0);
    }

    #[test]
    fn combined_takes_the_maximum_signal() {
        let report = AnomalyReport {
            latency_score: 0.2,
            error_rate_score: 0.9,
            throughput_score: 0.4,
        };
        assert_eq!(report.combined(), 0.9);
        assert_eq!(report.details()["error_rate_score"], 0.9);
    }
}
