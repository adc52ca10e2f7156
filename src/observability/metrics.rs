use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub struct Metrics {
    pub messages_sent: AtomicU64,
    pub messages_deleted: AtomicU64,
    pub notices_sent: AtomicU64,
    pub notices_suppressed: AtomicU64,
    pub notices_cleaned: AtomicU64,
    pub welcomes_sent: AtomicU64,
    pub membership_checks: AtomicU64,
    pub membership_cache_hits: AtomicU64,
    pub config_changes: AtomicU64,
    pub platform_errors: AtomicU64,
    pub start_time: Instant,
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub messages_sent: u64,
    pub messages_deleted: u64,
    pub notices_sent: u64,
    pub notices_suppressed: u64,
    pub notices_cleaned: u64,
    pub welcomes_sent: u64,
    pub membership_checks: u64,
    pub membership_cache_hits: u64,
    pub config_changes: u64,
    pub platform_errors: u64,
    pub uptime_secs: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            messages_sent: AtomicU64::new(0),
            messages_deleted: AtomicU64::new(0),
            notices_sent: AtomicU64::new(0),
            notices_suppressed: AtomicU64::new(0),
            notices_cleaned: AtomicU64::new(0),
            welcomes_sent: AtomicU64::new(0),
            membership_checks: AtomicU64::new(0),
            membership_cache_hits: AtomicU64::new(0),
            config_changes: AtomicU64::new(0),
            platform_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn increment_messages_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_messages_deleted(&self) {
        self.messages_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_notices_sent(&self) {
        self.notices_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_notices_suppressed(&self) {
        self.notices_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_notices_cleaned(&self) {
        self.notices_cleaned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_welcomes_sent(&self) {
        self.welcomes_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_membership_check(&self, cache_hit: bool) {
        self.membership_checks.fetch_add(1, Ordering::Relaxed);
        if cache_hit {
            self.membership_cache_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_config_changes(&self) {
        self.config_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_platform_errors(&self) {
        self.platform_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_deleted: self.messages_deleted.load(Ordering::Relaxed),
            notices_sent: self.notices_sent.load(Ordering::Relaxed),
            notices_suppressed: self.notices_suppressed.load(Ordering::Relaxed),
            notices_cleaned: self.notices_cleaned.load(Ordering::Relaxed),
            welcomes_sent: self.welcomes_sent.load(Ordering::Relaxed),
            membership_checks: self.membership_checks.load(Ordering::Relaxed),
            membership_cache_hits: self.membership_cache_hits.load(Ordering::Relaxed),
            config_changes: self.config_changes.load(Ordering::Relaxed),
            platform_errors: self.platform_errors.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}
