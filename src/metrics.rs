use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use utoipa::ToSchema;

/// Sink for editing counters. Implementations must not fail or block.
pub trait EditingMetrics: Send + Sync {
    fn on_undo(&self, doc_id: &str, version: u64);
    fn on_redo(&self, doc_id: &str, version: u64);
    fn on_command(&self, doc_id: &str);
}

#[derive(Debug, Default)]
struct Counters {
    undo: AtomicU64,
    redo: AtomicU64,
    command: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            undo: self.undo.load(Ordering::Relaxed),
            redo: self.redo.load(Ordering::Relaxed),
            command: self.command.load(Ordering::Relaxed),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub undo: u64,
    pub redo: u64,
    pub command: u64,
}

/// In-process counters: process-wide totals plus per-document counters that
/// are evicted after a period without activity.
pub struct CacheMetrics {
    per_doc: Cache<String, Arc<Counters>>,
    totals: Counters,
}

impl CacheMetrics {
    pub fn new(idle: Duration) -> Self {
        info!("Editing metrics initialized (per-document idle eviction after {:?})", idle);
        Self {
            per_doc: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(idle)
                .build(),
            totals: Counters::default(),
        }
    }

    fn counters(&self, doc_id: &str) -> Arc<Counters> {
        self.per_doc
            .get_with(doc_id.to_string(), || Arc::new(Counters::default()))
    }

    pub fn totals(&self) -> MetricsSnapshot {
        self.totals.snapshot()
    }

    pub fn for_document(&self, doc_id: &str) -> Option<MetricsSnapshot> {
        self.per_doc.get(doc_id).map(|c| c.snapshot())
    }

    pub fn tracked_documents(&self) -> u64 {
        self.per_doc.run_pending_tasks();
        self.per_doc.entry_count()
    }
}

impl EditingMetrics for CacheMetrics {
    fn on_undo(&self, doc_id: &str, version: u64) {
        debug!("metrics: undo on {} at version {}", doc_id, version);
        self.totals.undo.fetch_add(1, Ordering::Relaxed);
        self.counters(doc_id).undo.fetch_add(1, Ordering::Relaxed);
    }

    fn on_redo(&self, doc_id: &str, version: u64) {
        debug!("metrics: redo on {} at version {}", doc_id, version);
        self.totals.redo.fetch_add(1, Ordering::Relaxed);
        self.counters(doc_id).redo.fetch_add(1, Ordering::Relaxed);
    }

    fn on_command(&self, doc_id: &str) {
        self.totals.command.fetch_add(1, Ordering::Relaxed);
        self.counters(doc_id).command.fetch_add(1, Ordering::Relaxed);
    }
}
