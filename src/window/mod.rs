//! Rolling window store.
//!
//! # Responsibilities
//! - Hold time-ordered response-time and error samples per service
//! - Prune entries older than the monitoring window on every write
//!
//! # Design Decisions
//! - Pruning is a mandatory side effect of each push, not a periodic sweep,
//!   so windows never grow unbounded between scheduled passes
//! - Monotonic `Instant` timestamps; wall-clock time never drives eviction

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// A single successful response observation.
#[derive(Debug, Clone, Copy)]
pub struct ResponseSample {
    pub at: Instant,
    pub response_time_ms: f64,
}

/// A single failure observation, carrying the error description.
#[derive(Debug, Clone)]
pub struct ErrorSample {
    pub at: Instant,
    pub reason: String,
    pub response_time_ms: f64,
}

/// Time-bounded sequence of response-time samples.
#[derive(Debug)]
pub struct SampleWindow {
    window: Duration,
    samples: VecDeque<ResponseSample>,
}

impl SampleWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Append a sample and discard everything older than the window.
    pub fn push(&mut self, at: Instant, response_time_ms: f64) {
        self.samples.push_back(ResponseSample {
            at,
            response_time_ms,
        });
        self.prune(at);
    }

    /// Discard samples older than the monitoring window relative to `now`.
    pub fn prune(&mut self, now: Instant) {
        while let Some(front) = self.samples.front() {
            if now.duration_since(front.at) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Count of samples recorded within the trailing `span` of `now`.
    pub fn count_since(&self, now: Instant, span: Duration) -> usize {
        self.samples
            .iter()
            .rev()
            .take_while(|s| now.duration_since(s.at) <= span)
            .count()
    }

    /// Response times in arrival order.
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.response_time_ms).collect()
    }
}

/// Time-bounded sequence of error samples.
#[derive(Debug)]
pub struct ErrorWindow {
    window: Duration,
    samples: VecDeque<ErrorSample>,
}

impl ErrorWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Append an error and discard everything older than the window.
    pub fn push(&mut self, at: Instant, reason: String, response_time_ms: f64) {
        self.samples.push_back(ErrorSample {
            at,
            reason,
            response_time_ms,
        });
        self.prune(at);
    }

    pub fn prune(&mut self, now: Instant) {
        while let Some(front) = self.samples.front() {
            if now.duration_since(front.at) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Count of errors recorded within the trailing `span` of `now`.
    pub fn count_since(&self, now: Instant, span: Duration) -> usize {
        self.samples
            .iter()
            .rev()
            .take_while(|s| now.duration_since(s.at) <= span)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_prunes_expired_samples() {
        let mut window = SampleWindow::new(Duration::from_secs(60));
        let start = Instant::now();
        window.push(start, 100.0);
        window.push(start + Duration::from_secs(30), 110.0);
        assert_eq!(window.len(), 2);

        // A write 90s later evicts the first sample on its own.
        window.push(start + Duration::from_secs(90), 120.0);
        assert_eq!(window.len(), 2);
        assert_eq!(window.values(), vec![110.0, 120.0]);
    }

    #[test]
    fn count_since_only_counts_trailing_span() {
        let mut window = SampleWindow::new(Duration::from_secs(300));
        let start = Instant::now();
        for i in 0..5 {
            window.push(start + Duration::from_secs(i * 30), 50.0);
        }
        let now = start + Duration::from_secs(120);
        assert_eq!(window.count_since(now, Duration::from_secs(60)), 3);
        assert_eq!(window.count_since(now, Duration::from_secs(300)), 5);
    }

    #[test]
    fn error_window_keeps_reason() {
        let mut window = ErrorWindow::new(Duration::from_secs(300));
        let now = Instant::now();
        window.push(now, "connection refused".into(), 12.0);
        assert_eq!(window.len(), 1);
        assert_eq!(window.count_since(now, Duration::from_secs(1)), 1);
    }

    #[test]
    fn empty_windows_report_empty() {
        let window = SampleWindow::new(Duration::from_secs(1));
        assert!(window.is_empty());
        let errors = ErrorWindow::new(Duration::from_secs(1));
        assert!(errors.is_empty());
    }
}
