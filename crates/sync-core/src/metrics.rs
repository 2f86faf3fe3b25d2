//! Injected pipeline counters.
//!
//! Components that count messages receive a [`MetricsSink`] capability at
//! construction instead of touching process-wide state.

use std::sync::Arc;

pub trait MetricsSink: Send + Sync {
    /// Messages that passed the transform chain.
    fn incr_read(&self, n: u64);
    /// Messages successfully written downstream.
    fn incr_written(&self, n: u64);
}

/// Discards all counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn incr_read(&self, _n: u64) {}
    fn incr_written(&self, _n: u64) {}
}

impl<T: MetricsSink + ?Sized> MetricsSink for Arc<T> {
    fn incr_read(&self, n: u64) {
        (**self).incr_read(n)
    }
    fn incr_written(&self, n: u64) {
        (**self).incr_written(n)
    }
}
