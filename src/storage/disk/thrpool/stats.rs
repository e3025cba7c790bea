use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters for one queue instance
#[derive(Debug, Default)]
pub struct QueueStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    device_errors: AtomicU64,
    busy_rejections: AtomicU64,
}

/// Point-in-time copy of `QueueStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStatsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub device_errors: u64,
    pub busy_rejections: u64,
}

impl QueueStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self, count: u64) {
        self.completed.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_device_error(&self) {
        self.device_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_busy(&self) {
        self.busy_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
            busy_rejections: self.busy_rejections.load(Ordering::Relaxed),
        }
    }
}
