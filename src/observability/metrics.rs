// Context counters
//
// Process-wide tallies of launched, completed and failed contexts plus a
// histogram of guest run time. The CLI prints them after a batch.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::types::GuestFailure;

/// Monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Value that moves both ways.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        // saturating: a stray dec must not wrap
        let _ = self
            .value
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Cumulative run-time histogram, bounds in seconds.
#[derive(Debug)]
pub struct Histogram {
    bounds: Vec<f64>,
    counts: Vec<AtomicU64>,
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new_latency() -> Self {
        let bounds = vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0];
        let counts = bounds.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            counts,
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: Duration) {
        let seconds = value.as_secs_f64();
        self.sum_micros
            .fetch_add(value.as_micros() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        for (le, count) in self.bounds.iter().zip(&self.counts) {
            if seconds <= *le {
                count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn get_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn get_sum_micros(&self) -> u64 {
        self.sum_micros.load(Ordering::Relaxed)
    }

    pub fn get_bucket_count(&self, le: f64) -> u64 {
        self.bounds
            .iter()
            .position(|b| (b - le).abs() < 0.0001)
            .map(|i| self.counts[i].load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

#[derive(Debug)]
pub struct MetricsRegistry {
    pub contexts_launched: Counter,
    pub contexts_completed: Counter,
    pub contexts_failed: Counter,
    pub entry_points_missing: Counter,
    pub guests_panicked: Counter,
    pub contexts_running: Gauge,
    pub run_duration: Histogram,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            contexts_launched: Counter::new(),
            contexts_completed: Counter::new(),
            contexts_failed: Counter::new(),
            entry_points_missing: Counter::new(),
            guests_panicked: Counter::new(),
            contexts_running: Gauge::new(),
            run_duration: Histogram::new_latency(),
        }
    }

    pub fn record_failure(&self, failure: &GuestFailure) {
        self.contexts_failed.inc();
        match failure {
            GuestFailure::EntryPointNotFound { .. } => self.entry_points_missing.inc(),
            GuestFailure::Panicked { .. } => self.guests_panicked.inc(),
            _ => {}
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            launched: self.contexts_launched.get(),
            completed: self.contexts_completed.get(),
            failed: self.contexts_failed.get(),
            entry_points_missing: self.entry_points_missing.get(),
            panicked: self.guests_panicked.get(),
            running: self.contexts_running.get(),
            total_run_micros: self.run_duration.get_sum_micros(),
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub launched: u64,
    pub completed: u64,
    pub failed: u64,
    pub entry_points_missing: u64,
    pub panicked: u64,
    pub running: u64,
    pub total_run_micros: u64,
}

static METRICS: Lazy<Arc<MetricsRegistry>> = Lazy::new(|| Arc::new(MetricsRegistry::new()));

pub fn get_metrics() -> Arc<MetricsRegistry> {
    Arc::clone(&METRICS)
}
