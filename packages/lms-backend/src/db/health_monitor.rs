use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::db::config::HealthCheckConfig;

#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
    pub timestamp_ms: u64,
}

impl HealthCheckResult {
    pub fn healthy(latency: Duration) -> Self {
        Self {
            healthy: true,
            latency_ms: Some(latency.as_millis() as u64),
            error: None,
            timestamp_ms: now_ms(),
        }
    }

    pub fn unhealthy(error: String) -> Self {
        Self {
            healthy: false,
            latency_ms: None,
            error: Some(error),
            timestamp_ms: now_ms(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthCheckSnapshot {
    pub healthy: bool,
    pub degraded: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
    pub timestamp_ms: Option<u64>,
    pub consecutive_failures: u32,
}

/// Tracks the outcome of periodic `SELECT 1` checks against the pool.
#[derive(Debug)]
pub struct HealthTracker {
    config: HealthCheckConfig,
    consecutive_failures: u32,
    last_result: Option<HealthCheckResult>,
}

impl HealthTracker {
    pub fn new(config: HealthCheckConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
            last_result: None,
        }
    }

    pub fn process(&mut self, result: HealthCheckResult) {
        if result.healthy {
            if self.consecutive_failures > 0 {
                tracing::info!(
                    failures = self.consecutive_failures,
                    "database connection recovered"
                );
            }
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            if self.consecutive_failures == self.config.failure_threshold {
                tracing::warn!(
                    failures = self.consecutive_failures,
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "database health check failing"
                );
            }
        }
        self.last_result = Some(result);
    }

    pub fn snapshot(&self) -> HealthCheckSnapshot {
        HealthCheckSnapshot {
            healthy: self.last_result.as_ref().map(|r| r.healthy).unwrap_or(false),
            degraded: self.consecutive_failures >= self.config.failure_threshold,
            latency_ms: self.last_result.as_ref().and_then(|r| r.latency_ms),
            error: self.last_result.as_ref().and_then(|r| r.error.clone()),
            timestamp_ms: self.last_result.as_ref().map(|r| r.timestamp_ms),
            consecutive_failures: self.consecutive_failures,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> HealthTracker {
        HealthTracker::new(HealthCheckConfig {
            failure_threshold: 2,
            ..HealthCheckConfig::default()
        })
    }

    #[test]
    fn unknown_until_first_check() {
        let snapshot = tracker().snapshot();
        assert!(!snapshot.healthy);
        assert!(!snapshot.degraded);
        assert!(snapshot.timestamp_ms.is_none());
    }

    #[test]
    fn degraded_after_threshold_failures() {
        let mut tracker = tracker();
        tracker.process(HealthCheckResult::unhealthy("timeout".into()));
        assert!(!tracker.snapshot().degraded);
        tracker.process(HealthCheckResult::unhealthy("timeout".into()));
        assert!(tracker.snapshot().degraded);
    }

    #[test]
    fn success_resets_failures() {
        let mut tracker = tracker();
        tracker.process(HealthCheckResult::unhealthy("refused".into()));
        tracker.process(HealthCheckResult::unhealthy("refused".into()));
        tracker.process(HealthCheckResult::healthy(Duration::from_millis(3)));

        let snapshot = tracker.snapshot();
        assert!(snapshot.healthy);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(snapshot.latency_ms, Some(3));
    }
}
