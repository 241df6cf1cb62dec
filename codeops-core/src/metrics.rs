//! Process-wide run metrics
//!
//! A single [`MetricsAggregator`] is created at startup and handed to every
//! pipeline by `Arc`. Counters are plain atomics, so concurrent runs never lose
//! an increment; a snapshot reads each counter independently.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::pipeline::Verdict;

/// Shared counters for pipeline outcomes
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    total_runs: AtomicU64,
    success_count: AtomicU64,
    total_latency_ms: AtomicU64,
    total_tokens: AtomicU64,
    critic_run_count: AtomicU64,
    confidence_sum: AtomicU64,
}

impl MetricsAggregator {
    /// Create an aggregator with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a terminal pipeline outcome
    pub fn record_run(&self, verdict: Verdict, latency_seconds: f64) {
        // total before success, so a reader never sees more successes than runs
        self.total_runs.fetch_add(1, Ordering::SeqCst);
        if verdict.is_success() {
            self.success_count.fetch_add(1, Ordering::SeqCst);
        }
        let latency_ms = (latency_seconds.max(0.0) * 1000.0).round() as u64;
        self.total_latency_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
    }

    /// Record a critic review and its confidence
    pub fn record_critic(&self, confidence: u8) {
        self.critic_run_count.fetch_add(1, Ordering::Relaxed);
        self.confidence_sum
            .fetch_add(u64::from(confidence.min(100)), Ordering::Relaxed);
    }

    /// Record tokens billed by the completion service
    pub fn record_tokens(&self, tokens: u64) {
        self.total_tokens.fetch_add(tokens, Ordering::Relaxed);
    }

    /// Read the current counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        // Reverse of the write order in record_run
        let success_count = self.success_count.load(Ordering::SeqCst);
        let total_runs = self.total_runs.load(Ordering::SeqCst);

        MetricsSnapshot {
            total_runs,
            success_count,
            total_latency_seconds: self.total_latency_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
            critic_run_count: self.critic_run_count.load(Ordering::Relaxed),
            confidence_sum: self.confidence_sum.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the aggregate metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_runs: u64,
    pub success_count: u64,
    pub total_latency_seconds: f64,
    pub total_tokens: u64,
    pub critic_run_count: u64,
    pub confidence_sum: u64,
}

impl MetricsSnapshot {
    /// Runs that ended in failure
    pub fn failure_count(&self) -> u64 {
        self.total_runs.saturating_sub(self.success_count)
    }

    /// Fraction of runs that succeeded, 0 when nothing has run
    pub fn success_rate(&self) -> f64 {
        if self.total_runs == 0 {
            0.0
        } else {
            (self.success_count as f64 / self.total_runs as f64).min(1.0)
        }
    }

    /// Mean latency per run in seconds, 0 when nothing has run
    pub fn avg_latency_seconds(&self) -> f64 {
        if self.total_runs == 0 {
            0.0
        } else {
            self.total_latency_seconds / self.total_runs as f64
        }
    }

    /// Mean critic confidence, 0 when the critic has not run
    pub fn avg_confidence(&self) -> f64 {
        if self.critic_run_count == 0 {
            0.0
        } else {
            self.confidence_sum as f64 / self.critic_run_count as f64
        }
    }

    /// JSON view including the derived rates
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "total_runs": self.total_runs,
            "success_count": self.success_count,
            "failure_count": self.failure_count(),
            "success_rate": self.success_rate(),
            "total_latency_seconds": self.total_latency_seconds,
            "avg_latency_seconds": self.avg_latency_seconds(),
            "total_tokens": self.total_tokens,
            "critic_run_count": self.critic_run_count,
            "avg_confidence": self.avg_confidence(),
        })
    }
}
