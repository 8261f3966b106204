//! Export metrics.
//!
//! Counts jobs by outcome and keeps a bounded window of successful job
//! durations for percentile reporting. Counters are atomics so a single
//! collector can be shared across the batch and the CLI.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Maximum number of duration samples kept in memory.
const MAX_DURATION_SAMPLES: usize = 1000;

/// Export metrics collector.
#[derive(Debug)]
pub struct ConversionMetrics {
    /// Jobs started.
    pub jobs_started: AtomicU64,
    /// Jobs that completed successfully.
    pub jobs_succeeded: AtomicU64,
    /// Jobs that failed for any reason (timeouts and cancellations included).
    pub jobs_failed: AtomicU64,
    /// Jobs killed after exceeding the timeout.
    pub jobs_timed_out: AtomicU64,
    /// Jobs cancelled before or during execution.
    pub jobs_cancelled: AtomicU64,
    /// Jobs that went through the non-ASCII staging shim.
    pub jobs_staged: AtomicU64,
    /// Exported JSON files whose asset paths were rewritten.
    pub json_rewrites: AtomicU64,
    duration_samples: Mutex<VecDeque<Duration>>,
}

impl ConversionMetrics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self {
            jobs_started: AtomicU64::new(0),
            jobs_succeeded: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            jobs_timed_out: AtomicU64::new(0),
            jobs_cancelled: AtomicU64::new(0),
            jobs_staged: AtomicU64::new(0),
            json_rewrites: AtomicU64::new(0),
            duration_samples: Mutex::new(VecDeque::with_capacity(MAX_DURATION_SAMPLES)),
        }
    }

    pub fn record_started(&self) {
        self.jobs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, duration: Duration) {
        self.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut samples) = self.duration_samples.lock() {
            if samples.len() >= MAX_DURATION_SAMPLES {
                samples.pop_front();
            }
            samples.push_back(duration);
        }
    }

    pub fn record_failure(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A timeout also counts as a failure.
    pub fn record_timeout(&self) {
        self.jobs_timed_out.fetch_add(1, Ordering::Relaxed);
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A cancellation also counts as a failure.
    pub fn record_cancelled(&self) {
        self.jobs_cancelled.fetch_add(1, Ordering::Relaxed);
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_staged(&self) {
        self.jobs_staged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rewrite(&self) {
        self.json_rewrites.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters and duration percentiles.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut sorted: Vec<Duration> = self
            .duration_samples
            .lock()
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        sorted.sort();

        let percentile = |pct: usize| -> Option<Duration> {
            if sorted.is_empty() {
                return None;
            }
            let idx = ((sorted.len() - 1) * pct) / 100;
            sorted.get(idx).copied()
        };

        MetricsSnapshot {
            jobs_started: self.jobs_started.load(Ordering::Relaxed),
            jobs_succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_timed_out: self.jobs_timed_out.load(Ordering::Relaxed),
            jobs_cancelled: self.jobs_cancelled.load(Ordering::Relaxed),
            jobs_staged: self.jobs_staged.load(Ordering::Relaxed),
            json_rewrites: self.json_rewrites.load(Ordering::Relaxed),
            duration_p50: percentile(50),
            duration_p95: percentile(95),
            duration_p99: percentile(99),
            sample_count: sorted.len() as u64,
        }
    }
}

impl Default for ConversionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of export metrics. Durations serialize as milliseconds.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub jobs_started: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_timed_out: u64,
    pub jobs_cancelled: u64,
    pub jobs_staged: u64,
    pub json_rewrites: u64,
    #[serde(with = "opt_millis")]
    pub duration_p50: Option<Duration>,
    #[serde(with = "opt_millis")]
    pub duration_p95: Option<Duration>,
    #[serde(with = "opt_millis")]
    pub duration_p99: Option<Duration>,
    pub sample_count: u64,
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let millis: Option<u64> = Option::deserialize(d)?;
        Ok(millis.map(Duration::from_millis))
    }
}
