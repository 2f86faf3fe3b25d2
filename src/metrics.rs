//! Process-local pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};

use sync_core::MetricsSink;

/// Atomic counters, reported through the log on shutdown.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    read: AtomicU64,
    written: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> u64 {
        self.read.load(Ordering::Relaxed)
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn report(&self) {
        tracing::info!(read = self.read(), written = self.written(), "pipeline totals");
    }
}

impl MetricsSink for PipelineMetrics {
    fn incr_read(&self, n: u64) {
        self.read.fetch_add(n, Ordering::Relaxed);
    }

    fn incr_written(&self, n: u64) {
        self.written.fetch_add(n, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = PipelineMetrics::new();
        metrics.incr_read(3);
        metrics.incr_read(2);
        metrics.incr_written(4);
        assert_eq!(metrics.read(), 5);
        assert_eq!(metrics.written(), 4);
    }
}
