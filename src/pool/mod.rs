//! Fixed-size worker pool for outbound fetches.
//!
//! Responsibilities:
//! - Bound fetch concurrency to `worker_count` executor slots.
//! - Guarantee each accepted task resolves or rejects exactly once.
//! - Serve repeated queries from the response cache without dispatch.
//! - Queue overflow submissions FIFO; no priorities.
//! - Force-reject tasks with no worker response within the timeout and
//!   free the slot for the next queued task.
//!
//! Timeout semantics are **abandon, not cancel**: the underlying request
//! keeps running; its eventual completion carries a stale generation and
//! is discarded, so it can neither resolve the task a second time nor
//! overwrite a newer cache entry.
//!
//! Failure isolation: a transport error rejects only the task on that
//! slot. Pool termination rejects all outstanding and queued tasks with a
//! distinguished error.

pub mod task;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::ResponseCache;
use crate::catalog::Endpoint;
use crate::error::TaskError;
use crate::market::client::PairFetcher;
use crate::market::types::{Pair, dedup_by_address};
use crate::metrics::Counters;
use crate::pool::task::{Task, TaskKind, batch_cache_key, comprehensive_cache_key};

type TaskResult = Result<Vec<Pair>, TaskError>;

/// Read-only pool introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub total_workers: usize,
    pub busy_workers: usize,
    pub pending_tasks: usize,
    pub queued_tasks: usize,
}

/// Result of the composite list + trending fetch.
#[derive(Debug, Clone)]
pub struct ComprehensiveData {
    pub tokens: Vec<Pair>,
    pub trending: Vec<Pair>,
    pub total: usize,
}

/// One executor slot: at most one dispatched task at a time.
struct Slot {
    busy: bool,
}

/// A dispatched task waiting for its worker reply.
struct Pending {
    slot_id: usize,
    generation: u64,
    kind: TaskKind,
    resolver: oneshot::Sender<TaskResult>,
}

/// A task waiting for a free slot.
struct Queued {
    task: Task,
    resolver: oneshot::Sender<TaskResult>,
}

struct PoolState {
    initialized: bool,
    terminated: bool,
    slots: Vec<Slot>,
    /// Invariant: bijection with busy slots — every pending task maps to
    /// exactly one busy slot and vice versa.
    pending: HashMap<Uuid, Pending>,
    queue: VecDeque<Queued>,
    next_generation: u64,
}

pub struct WorkerPool<F: PairFetcher> {
    fetcher: Arc<F>,
    cache: Arc<ResponseCache>,
    state: Mutex<PoolState>,
    worker_count: usize,
    task_timeout: Duration,
    /// `None` = unbounded overflow queue (logged as an operational risk);
    /// `Some(n)` rejects the newest submission once n tasks are queued.
    queue_capacity: Option<usize>,
    counters: Counters,
}

impl<F: PairFetcher> WorkerPool<F> {
    pub fn new(
        fetcher: Arc<F>,
        cache: Arc<ResponseCache>,
        worker_count: usize,
        task_timeout: Duration,
        queue_capacity: Option<usize>,
    ) -> Arc<Self> {
        Arc::new(Self {
            fetcher,
            cache,
            state: Mutex::new(PoolState {
                initialized: false,
                terminated: false,
                slots: Vec::new(),
                pending: HashMap::new(),
                queue: VecDeque::new(),
                next_generation: 0,
            }),
            worker_count: worker_count.max(1),
            task_timeout,
            queue_capacity,
            counters: Counters::default(),
        })
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn stats(&self) -> PoolStats {
        let st = self.state.lock();
        PoolStats {
            total_workers: if st.initialized { st.slots.len() } else { 0 },
            busy_workers: st.slots.iter().filter(|s| s.busy).count(),
            pending_tasks: st.pending.len(),
            queued_tasks: st.queue.len(),
        }
    }

    /// Cache-aware task execution. Exactly one of Ok/Err per call.
    pub async fn execute(self: &Arc<Self>, kind: TaskKind) -> TaskResult {
        if self.state.lock().terminated {
            return Err(TaskError::PoolTerminated);
        }

        self.ensure_initialized();

        // Opportunistic namespace sweep, piggybacked on every execute.
        self.cache.sweep().await;

        let key = kind.cache_key();
        if let Some(hit) = self.cache.get(&key).await {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(key, "task served from cache; no dispatch");
            return Ok(hit);
        }
        self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
        self.counters.tasks_submitted.fetch_add(1, Ordering::Relaxed);

        let task = Task::new(kind);
        let (tx, rx) = oneshot::channel();

        let dispatch = {
            let mut st = self.state.lock();

            if st.terminated {
                return Err(TaskError::PoolTerminated);
            }

            match st.slots.iter().position(|s| !s.busy) {
                Some(slot_id) => Some(Self::assign(&mut st, slot_id, task, tx)),
                None => {
                    if let Some(capacity) = self.queue_capacity {
                        if st.queue.len() >= capacity {
                            self.counters.queue_rejections.fetch_add(1, Ordering::Relaxed);
                            drop(st);
                            warn!(capacity, "overflow queue full; rejecting newest task");
                            return Err(TaskError::QueueFull { capacity });
                        }
                    }
                    st.queue.push_back(Queued { task, resolver: tx });
                    None
                }
            }
        };

        if let Some(d) = dispatch {
            self.spawn_fetch(d);
        }

        match rx.await {
            Ok(result) => result,
            // Resolver dropped without a verdict only happens on teardown races.
            Err(_) => Err(TaskError::PoolTerminated),
        }
    }

    /// Fan-out one task per endpoint, tolerate partial failure, merge and
    /// dedup (first-seen wins), cache the batch under the endpoint set.
    pub async fn fetch_multiple_endpoints(self: &Arc<Self>, endpoints: &[Endpoint]) -> Vec<Pair> {
        let paths: Vec<String> = endpoints.iter().map(|e| e.path.clone()).collect();
        let batch_key = batch_cache_key(&paths);

        if let Some(hit) = self.cache.get(&batch_key).await {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return hit;
        }

        let fetches = endpoints.iter().map(|e| {
            let pool = Arc::clone(self);
            let name = e.name.clone();
            let kind = TaskKind::FetchEndpoint {
                path: e.path.clone(),
            };
            async move { (name, pool.execute(kind).await) }
        });

        let mut merged = Vec::new();
        let mut successes = 0usize;
        for (name, result) in futures::future::join_all(fetches).await {
            match result {
                Ok(pairs) => {
                    successes += 1;
                    merged.extend(pairs);
                }
                // Partial failure tolerance: log and exclude, never fatal.
                Err(e) => warn!(endpoint = %name, error = %e, "endpoint failed in batch; excluded"),
            }
        }

        let merged = dedup_by_address(merged);

        // A batch with zero successes carries no information; caching it
        // would pin an empty result under the batch key for a full window
        // and suppress retries.
        if successes > 0 {
            self.cache.put(&batch_key, &merged).await;
        } else if !endpoints.is_empty() {
            warn!(endpoints = endpoints.len(), "every endpoint failed in batch; result not cached");
        }

        merged
    }

    /// Bulk list fetch + trending fetch, run concurrently with the same
    /// partial-failure tolerance; union deduplicated by pair address.
    pub async fn fetch_comprehensive(self: &Arc<Self>, list_query: &str) -> ComprehensiveData {
        let list = self.execute(TaskKind::FetchList {
            query: list_query.to_string(),
        });
        let trending = self.execute(TaskKind::FetchTrending);

        let (list, trending) = tokio::join!(list, trending);

        let tokens = list.unwrap_or_else(|e| {
            warn!(error = %e, "list fetch failed in comprehensive scan; excluded");
            Vec::new()
        });
        let trending = trending.unwrap_or_else(|e| {
            warn!(error = %e, "trending fetch failed in comprehensive scan; excluded");
            Vec::new()
        });

        let union = dedup_by_address(tokens.iter().chain(trending.iter()).cloned().collect());
        self.cache.put(&comprehensive_cache_key(), &union).await;

        ComprehensiveData {
            total: union.len(),
            tokens,
            trending,
        }
    }

    /// Rejects all outstanding and queued tasks and refuses new work.
    /// Idempotent.
    pub fn terminate(&self) {
        let (pending, queued) = {
            let mut st = self.state.lock();
            if st.terminated {
                return;
            }
            st.terminated = true;

            let pending: Vec<Pending> = st.pending.drain().map(|(_, p)| p).collect();
            let queued: Vec<Queued> = st.queue.drain(..).collect();
            for slot in &mut st.slots {
                slot.busy = false;
            }
            (pending, queued)
        };

        let rejected = pending.len() + queued.len();

        for p in pending {
            let _ = p.resolver.send(Err(TaskError::PoolTerminated));
        }
        for q in queued {
            let _ = q.resolver.send(Err(TaskError::PoolTerminated));
        }

        self.counters
            .tasks_rejected
            .fetch_add(rejected as u64, Ordering::Relaxed);

        info!(rejected, "worker pool terminated");
    }

    fn ensure_initialized(&self) {
        let mut st = self.state.lock();
        if st.initialized {
            return;
        }

        st.slots = (0..self.worker_count).map(|_| Slot { busy: false }).collect();
        st.initialized = true;

        info!(
            component = "pool",
            event = "startup",
            workers = self.worker_count,
            "worker pool initialized"
        );

        if self.queue_capacity.is_none() {
            warn!(
                component = "pool",
                "overflow queue is unbounded; depth can grow without bound under sustained overload"
            );
        }
    }

    /// Marks `slot_id` busy and registers the pending task. Caller holds
    /// the state lock and spawns the returned dispatch after releasing it.
    fn assign(
        st: &mut PoolState,
        slot_id: usize,
        task: Task,
        resolver: oneshot::Sender<TaskResult>,
    ) -> Dispatch {
        let generation = st.next_generation;
        st.next_generation += 1;

        st.slots[slot_id].busy = true;
        st.pending.insert(
            task.id,
            Pending {
                slot_id,
                generation,
                kind: task.kind.clone(),
                resolver,
            },
        );

        Dispatch {
            slot_id,
            task_id: task.id,
            generation,
            kind: task.kind,
        }
    }

    fn spawn_fetch(self: &Arc<Self>, d: Dispatch) {
        debug!(
            task_id = %d.task_id,
            slot = d.slot_id,
            generation = d.generation,
            kind = d.kind.name(),
            "dispatching task to executor slot"
        );

        let pool = Arc::clone(self);
        let kind = d.kind.clone();
        tokio::spawn(async move {
            let result = pool.fetcher.fetch(&kind).await;
            pool.complete(d.task_id, d.generation, result).await;
        });

        let pool = Arc::clone(self);
        let timeout = self.task_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            pool.expire(d.task_id, d.generation).await;
        });
    }

    /// Worker reply path. Stale generations (task already timed out or
    /// pool torn down) are discarded without touching cache or resolver.
    async fn complete(
        self: &Arc<Self>,
        task_id: Uuid,
        generation: u64,
        result: Result<Vec<Pair>, crate::error::FetchError>,
    ) {
        let (pending, next) = {
            let mut st = self.state.lock();

            let matches = st
                .pending
                .get(&task_id)
                .is_some_and(|p| p.generation == generation);
            if !matches {
                self.counters.stale_replies.fetch_add(1, Ordering::Relaxed);
                debug!(task_id = %task_id, generation, "stale worker reply discarded");
                return;
            }

            let Some(pending) = st.pending.remove(&task_id) else {
                return;
            };
            st.slots[pending.slot_id].busy = false;
            let next = Self::promote_queued(&mut st, pending.slot_id);
            (pending, next)
        };

        if let Some(d) = next {
            self.spawn_fetch(d);
        }

        match result {
            Ok(pairs) => {
                // Write-through before resolving the caller.
                self.cache.put(&pending.kind.cache_key(), &pairs).await;
                self.counters.tasks_resolved.fetch_add(1, Ordering::Relaxed);
                let _ = pending.resolver.send(Ok(pairs));
            }
            Err(e) => {
                self.counters.tasks_rejected.fetch_add(1, Ordering::Relaxed);
                warn!(task_id = %task_id, error = %e, "task failed on executor slot");
                let _ = pending.resolver.send(Err(TaskError::Transport(e.to_string())));
            }
        }
    }

    /// Timeout path: reject the task once, free the slot, promote the next
    /// queued task. The in-flight request is abandoned, not cancelled.
    async fn expire(self: &Arc<Self>, task_id: Uuid, generation: u64) {
        let expired = {
            let mut st = self.state.lock();

            let matches = st
                .pending
                .get(&task_id)
                .is_some_and(|p| p.generation == generation);
            if !matches {
                return; // resolved in time, or already gone
            }

            let Some(pending) = st.pending.remove(&task_id) else {
                return;
            };
            st.slots[pending.slot_id].busy = false;
            let next = Self::promote_queued(&mut st, pending.slot_id);
            Some((pending, next))
        };

        if let Some((pending, next)) = expired {
            self.counters.tasks_timed_out.fetch_add(1, Ordering::Relaxed);
            warn!(
                task_id = %task_id,
                slot = pending.slot_id,
                timeout_ms = self.task_timeout.as_millis() as u64,
                "task timed out; abandoning in-flight request and freeing slot"
            );

            let _ = pending.resolver.send(Err(TaskError::Timeout {
                ms: self.task_timeout.as_millis() as u64,
            }));

            if let Some(d) = next {
                self.spawn_fetch(d);
            }
        }
    }

    /// FIFO promotion of the oldest queued task onto a freed slot.
    fn promote_queued(st: &mut PoolState, slot_id: usize) -> Option<Dispatch> {
        let queued = st.queue.pop_front()?;
        Some(Self::assign(st, slot_id, queued.task, queued.resolver))
    }
}

struct Dispatch {
    slot_id: usize,
    task_id: Uuid,
    generation: u64,
    kind: TaskKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::repository::MemoryCacheRepository;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct InstantFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PairFetcher for InstantFetcher {
        async fn fetch(&self, _kind: &TaskKind) -> Result<Vec<Pair>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    fn mk_pool(workers: usize) -> (Arc<WorkerPool<InstantFetcher>>, Arc<InstantFetcher>) {
        let fetcher = Arc::new(InstantFetcher {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(ResponseCache::new(
            Arc::new(MemoryCacheRepository::new()),
            Duration::from_secs(30),
        ));
        let pool = WorkerPool::new(
            Arc::clone(&fetcher),
            cache,
            workers,
            Duration::from_secs(15),
            None,
        );
        (pool, fetcher)
    }

    #[tokio::test]
    async fn stats_report_idle_pool_after_first_execute() {
        let (pool, _) = mk_pool(3);

        // Uninitialized pool exposes zero workers.
        assert_eq!(pool.stats().total_workers, 0);

        pool.execute(TaskKind::FetchTrending).await.unwrap();

        let stats = pool.stats();
        assert_eq!(stats.total_workers, 3);
        assert_eq!(stats.busy_workers, 0);
        assert_eq!(stats.pending_tasks, 0);
        assert_eq!(stats.queued_tasks, 0);
    }

    #[tokio::test]
    async fn terminated_pool_rejects_new_work() {
        let (pool, fetcher) = mk_pool(2);
        pool.terminate();
        pool.terminate(); // idempotent

        let out = pool.execute(TaskKind::FetchTrending).await;
        assert_eq!(out.unwrap_err(), TaskError::PoolTerminated);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeated_query_hits_cache_without_dispatch() {
        let (pool, fetcher) = mk_pool(2);

        pool.execute(TaskKind::FetchTrending).await.unwrap();
        pool.execute(TaskKind::FetchTrending).await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pool.counters().cache_hits.load(Ordering::Relaxed), 1);
    }
}
