//! Per-face traffic counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters kept by every face.
#[derive(Debug, Default)]
pub struct FaceMetrics {
    pub interests_sent: Counter,
    pub interests_received: Counter,
    pub data_sent: Counter,
    pub data_received: Counter,
    pub nacks_sent: Counter,
    pub nacks_received: Counter,
    pub bytes_sent: Counter,
    pub bytes_received: Counter,
}

impl FaceMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates() {
        let c = Counter::new();
        c.increment();
        c.add(4);
        assert_eq!(c.value(), 5);
    }
}
