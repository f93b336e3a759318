use std::sync::Arc;
use std::sync::atomic::AtomicU64;

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub tasks_submitted: Arc<AtomicU64>,
    pub tasks_resolved: Arc<AtomicU64>,
    pub tasks_rejected: Arc<AtomicU64>,
    pub tasks_timed_out: Arc<AtomicU64>,

    pub cache_hits: Arc<AtomicU64>,
    pub cache_misses: Arc<AtomicU64>,

    /// Completions that arrived after their task was abandoned.
    pub stale_replies: Arc<AtomicU64>,

    pub queue_rejections: Arc<AtomicU64>,
}
