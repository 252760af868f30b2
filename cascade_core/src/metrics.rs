use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Running counters for one engine.
#[derive(Debug, Default)]
pub struct CascadeMetrics {
    requests: AtomicU64,
    events_emitted: AtomicU64,
    budget_violations: AtomicU64,
    last_request_us: AtomicU64,
    rebuilds: AtomicU64,
    rebuild_failures: AtomicU64,
}

impl CascadeMetrics {
    pub fn record_request(&self, elapsed: Duration, events: usize, budget_exceeded: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.events_emitted
            .fetch_add(events as u64, Ordering::Relaxed);
        if budget_exceeded {
            self.budget_violations.fetch_add(1, Ordering::Relaxed);
        }
        self.last_request_us
            .store(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_rebuild(&self, succeeded: bool) {
        if succeeded {
            self.rebuilds.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rebuild_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self, cache_hits: u64, cache_misses: u64) -> CascadeMetricsSnapshot {
        CascadeMetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            budget_violations: self.budget_violations.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            last_request_us: self.last_request_us.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
            rebuild_failures: self.rebuild_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeMetricsSnapshot {
    /// Single-source analyses, including each trigger of a chain wave.
    pub requests: u64,
    pub events_emitted: u64,
    pub budget_violations: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub last_request_us: u64,
    pub rebuilds: u64,
    pub rebuild_failures: u64,
}

impl CascadeMetricsSnapshot {
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}
