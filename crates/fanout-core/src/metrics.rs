//! Delivery counters for the dispatch engine.
//!
//! Counters are monotonic for the process lifetime; per-analyzer entries
//! survive deregistration so historical totals remain visible. Every mutation
//! takes the write lock for the duration of the update only, and snapshots
//! copy the per-analyzer map so readers never race later updates.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;

/// Shared counter state, guarded by one reader/writer lock.
#[derive(Debug, Default)]
pub struct Metrics {
    inner: RwLock<MetricsSnapshot>,
}

/// A point-in-time, internally consistent copy of the counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub total_received: u64,
    pub total_sent: u64,
    pub total_dropped: u64,
    pub per_analyzer: HashMap<String, u64>,
}

impl Metrics {
    pub fn record_received(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.total_received += 1;
    }

    pub fn record_sent(&self, analyzer_id: &str) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.total_sent += 1;
        *inner
            .per_analyzer
            .entry(analyzer_id.to_string())
            .or_insert(0) += 1;
    }

    pub fn record_dropped(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.total_dropped += 1;
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
