//! Performance Monitor (C4): a bounded ring buffer of per-call metrics with
//! a rolled-up health check.
//!
//! Grounded in `original_source/fs_agt_clean/core/monitoring/ai_performance_monitor.py`;
//! the ring-buffer-plus-single-lock discipline mirrors the
//! `tokio::sync::RwLock`-guarded shared state in `src/cloudllm/agent.rs`.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::ErrorKind;

/// One recorded LLM call outcome.
#[derive(Debug, Clone)]
pub struct PerfSample {
    pub model: String,
    pub response_time_sec: f64,
    pub prompt_len: usize,
    pub response_len: usize,
    pub success: bool,
    pub error_kind: Option<ErrorKind>,
}

impl PerfSample {
    pub fn success(model: String, response_time_sec: f64, prompt_len: usize, response_len: usize) -> Self {
        Self { model, response_time_sec, prompt_len, response_len, success: true, error_kind: None }
    }

    pub fn failure(model: String, response_time_sec: f64, prompt_len: usize, kind: ErrorKind) -> Self {
        Self {
            model,
            response_time_sec,
            prompt_len,
            response_len: 0,
            success: false,
            error_kind: Some(kind),
        }
    }
}

/// Health status rolled up from the most recent samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone)]
pub struct Health {
    pub status: HealthStatus,
    pub issues: Vec<String>,
}

/// Aggregate statistics over the last N samples.
#[derive(Debug, Clone, Default)]
pub struct PerfSummary {
    pub total_samples: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub avg_response_time_sec: f64,
    pub error_rate: f64,
}

/// Thresholds controlling [`PerformanceMonitor::health`].
#[derive(Debug, Clone)]
pub struct HealthThresholds {
    pub response_time_warning_sec: f64,
    pub response_time_critical_sec: f64,
    pub error_rate_warning: f64,
    pub error_rate_critical: f64,
    pub window: usize,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            response_time_warning_sec: 5.0,
            response_time_critical_sec: 15.0,
            error_rate_warning: 0.1,
            error_rate_critical: 0.3,
            window: 20,
        }
    }
}

struct Inner {
    buffer: VecDeque<PerfSample>,
    max_history: usize,
}

/// C4: a fixed-capacity ring buffer of [`PerfSample`]s plus health rollup.
pub struct PerformanceMonitor {
    inner: Mutex<Inner>,
    thresholds: HealthThresholds,
}

impl PerformanceMonitor {
    pub fn new(max_history: usize) -> Self {
        Self {
            inner: Mutex::new(Inner { buffer: VecDeque::with_capacity(max_history), max_history }),
            thresholds: HealthThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Record one sample. O(1); evicts the oldest entry on overflow.
    pub fn record(&self, sample: PerfSample) {
        let mut inner = self.inner.lock().expect("perf monitor lock poisoned");
        if inner.buffer.len() >= inner.max_history {
            inner.buffer.pop_front();
        }
        inner.buffer.push_back(sample);
    }

    /// Aggregate the last `last_n` samples (most recent first in the buffer order).
    pub fn summary(&self, last_n: usize) -> PerfSummary {
        let inner = self.inner.lock().expect("perf monitor lock poisoned");
        let take = last_n.min(inner.buffer.len());
        let recent: Vec<&PerfSample> = inner.buffer.iter().rev().take(take).collect();

        if recent.is_empty() {
            return PerfSummary::default();
        }

        let success_count = recent.iter().filter(|s| s.success).count();
        let error_count = recent.len() - success_count;
        let avg_response_time_sec =
            recent.iter().map(|s| s.response_time_sec).sum::<f64>() / recent.len() as f64;

        PerfSummary {
            total_samples: recent.len(),
            success_count,
            error_count,
            avg_response_time_sec,
            error_rate: error_count as f64 / recent.len() as f64,
        }
    }

    /// Roll up health over the configured window (default last 20 samples).
    pub fn health(&self) -> Health {
        let summary = self.summary(self.thresholds.window);
        let mut issues = Vec::new();
        let mut status = HealthStatus::Healthy;

        if summary.total_samples == 0 {
            return Health { status, issues };
        }

        if summary.error_rate >= self.thresholds.error_rate_critical {
            status = HealthStatus::Critical;
            issues.push(format!("error rate {:.0}% at or above critical threshold", summary.error_rate * 100.0));
        } else if summary.error_rate >= self.thresholds.error_rate_warning {
            status = HealthStatus::Warning;
            issues.push(format!("error rate {:.0}% at or above warning threshold", summary.error_rate * 100.0));
        }

        if summary.avg_response_time_sec >= self.thresholds.response_time_critical_sec {
            status = HealthStatus::Critical;
            issues.push(format!(
                "avg response time {:.2}s at or above critical threshold",
                summary.avg_response_time_sec
            ));
        } else if summary.avg_response_time_sec >= self.thresholds.response_time_warning_sec
            && status == HealthStatus::Healthy
        {
            status = HealthStatus::Warning;
            issues.push(format!(
                "avg response time {:.2}s at or above warning threshold",
                summary.avg_response_time_sec
            ));
        }

        Health { status, issues }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_evicts_oldest() {
        let monitor = PerformanceMonitor::new(3);
        for i in 0..5 {
            monitor.record(PerfSample::success(format!("m{i}"), 0.1, 10, 10));
        }
        let summary = monitor.summary(10);
        assert_eq!(summary.total_samples, 3);
    }

    #[test]
    fn health_reports_critical_on_high_error_rate() {
        let monitor = PerformanceMonitor::new(100);
        for _ in 0..5 {
            monitor.record(PerfSample::failure("m".into(), 0.1, 10, ErrorKind::Transport));
        }
        assert_eq!(monitor.health().status, HealthStatus::Critical);
    }

    #[test]
    fn health_is_healthy_with_no_samples() {
        let monitor = PerformanceMonitor::new(100);
        assert_eq!(monitor.health().status, HealthStatus::Healthy);
    }
}
