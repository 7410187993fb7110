// Counters shared by the credential and rate caches

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct CacheStats {
    pub hit_count: AtomicUsize,
    pub miss_count: AtomicUsize,
    pub refresh_count: AtomicUsize,
    pub refresh_failure_count: AtomicUsize,
    pub stale_served_count: AtomicUsize,
}

// Point-in-time copy of the counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStatsReport {
    pub hit_count: usize,
    pub miss_count: usize,
    pub refresh_count: usize,
    pub refresh_failure_count: usize,
    pub stale_served_count: usize,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hit_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_miss(&self) {
        self.miss_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_refresh(&self) {
        self.refresh_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_refresh_failure(&self) {
        self.refresh_failure_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_stale_served(&self) {
        self.stale_served_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn report(&self) -> CacheStatsReport {
        CacheStatsReport {
            hit_count: self.hit_count.load(Ordering::SeqCst),
            miss_count: self.miss_count.load(Ordering::SeqCst),
            refresh_count: self.refresh_count.load(Ordering::SeqCst),
            refresh_failure_count: self.refresh_failure_count.load(Ordering::SeqCst),
            stale_served_count: self.stale_served_count.load(Ordering::SeqCst),
        }
    }
}
