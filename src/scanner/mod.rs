//! Continuous multi-cadence market scanner.
//!
//! Keeps the worker pool busy across a spread of cadences without a
//! synchronized thundering herd, and maintains a rolling per-lane view of
//! the market:
//!   • N fixed-cadence loops, first runs staggered by loop index × 1s,
//!     each tick running one of four rotating scan shapes,
//!   • an endpoint-rotation loop walking the catalog round-robin,
//!   • a quick trending check and a reduced random batch on their own
//!     fixed periods.
//!
//! Timers are independent and may overlap in wall-clock execution; the
//! pool serializes actual dispatch and every lane write fully replaces
//! the lane, so overlapping scans race harmlessly (last write wins).
//! Every completed step feeds the alert pipeline; step failures are
//! logged and never tear down a timer.

pub mod seed;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::alerts::AlertPipeline;
use crate::catalog::EndpointCatalog;
use crate::config::AppConfig;
use crate::market::client::PairFetcher;
use crate::market::types::{Pair, dedup_by_address};
use crate::pool::WorkerPool;
use crate::pool::task::TaskKind;

/// Broad queries cycled by the large single-list scan shape.
const LIST_QUERIES: &[&str] = &["USDC", "USDT", "WETH", "SOL"];

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Periods of the fixed-cadence loops, one per loop.
    pub scan_intervals: Vec<Duration>,
    pub rotation_interval: Duration,
    pub quick_trending_interval: Duration,
    pub reduced_batch_interval: Duration,
    pub random_batch_size: usize,
    pub reduced_batch_size: usize,
}

impl ScannerConfig {
    pub fn from_app(cfg: &AppConfig) -> Self {
        Self {
            scan_intervals: cfg
                .scan_intervals_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            rotation_interval: Duration::from_millis(cfg.rotation_interval_ms),
            quick_trending_interval: Duration::from_millis(cfg.quick_trending_interval_ms),
            reduced_batch_interval: Duration::from_millis(cfg.reduced_batch_interval_ms),
            random_batch_size: cfg.random_batch_size,
            reduced_batch_size: cfg.reduced_batch_size,
        }
    }
}

/// Read-only scanner introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerStats {
    pub is_running: bool,
    pub scan_counter: u64,
    pub active_scans: u64,
    pub cached_lane_count: usize,
}

pub struct ContinuousScanner<F: PairFetcher> {
    pool: Arc<WorkerPool<F>>,
    catalog: EndpointCatalog,
    pipeline: Arc<AlertPipeline>,
    cfg: ScannerConfig,

    /// Latest result set per lane; whole-lane replacement on write.
    lanes: Mutex<HashMap<String, Vec<Pair>>>,

    running: AtomicBool,
    scan_counter: AtomicU64,
    active_scans: AtomicU64,
    rotation_cursor: AtomicUsize,

    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<F: PairFetcher> ContinuousScanner<F> {
    pub fn new(
        pool: Arc<WorkerPool<F>>,
        catalog: EndpointCatalog,
        pipeline: Arc<AlertPipeline>,
        cfg: ScannerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            pool,
            catalog,
            pipeline,
            cfg,
            lanes: Mutex::new(HashMap::new()),
            running: AtomicBool::new(false),
            scan_counter: AtomicU64::new(0),
            active_scans: AtomicU64::new(0),
            rotation_cursor: AtomicUsize::new(0),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Starts all timers. No-op when already running.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("scanner already running; start ignored");
            return;
        }

        info!(
            component = "scanner",
            event = "startup",
            fixed_loops = self.cfg.scan_intervals.len(),
            catalog = self.catalog.len(),
            "continuous scanner starting"
        );

        let mut handles = self.handles.lock();

        for (loop_index, period) in self.cfg.scan_intervals.iter().copied().enumerate() {
            let scanner = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                // Stagger first runs by one second per loop to avoid a
                // synchronized burst at startup.
                tokio::time::sleep(Duration::from_secs(loop_index as u64)).await;

                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    ticker.tick().await;
                    scanner.run_fixed_step(loop_index).await;
                }
            }));
        }

        let scanner = Arc::clone(self);
        let rotation_period = self.cfg.rotation_interval;
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(rotation_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                scanner.run_rotation_step().await;
            }
        }));

        let scanner = Arc::clone(self);
        let quick_period = self.cfg.quick_trending_interval;
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(quick_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                scanner.run_quick_trending_step().await;
            }
        }));

        let scanner = Arc::clone(self);
        let reduced_period = self.cfg.reduced_batch_interval;
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(reduced_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                scanner.run_reduced_batch_step().await;
            }
        }));
    }

    /// Stops all timers and drops lane state. No-op when not running.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            debug!("scanner not running; stop ignored");
            return;
        }

        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        for h in handles {
            h.abort();
        }

        self.lanes.lock().clear();

        info!(component = "scanner", event = "shutdown", "continuous scanner stopped");
    }

    pub fn stats(&self) -> ScannerStats {
        ScannerStats {
            is_running: self.running.load(Ordering::SeqCst),
            scan_counter: self.scan_counter.load(Ordering::SeqCst),
            active_scans: self.active_scans.load(Ordering::SeqCst),
            cached_lane_count: self.lanes.lock().len(),
        }
    }

    /// Latest result set for one lane.
    pub fn lane(&self, name: &str) -> Option<Vec<Pair>> {
        self.lanes.lock().get(name).cloned()
    }

    pub fn lane_names(&self) -> Vec<String> {
        self.lanes.lock().keys().cloned().collect()
    }

    /// Union of all lanes, deduplicated by pair address. Lanes are never
    /// merged implicitly; this is the one explicit union entry point.
    pub fn all_pairs(&self) -> Vec<Pair> {
        let merged: Vec<Pair> = {
            let lanes = self.lanes.lock();
            lanes.values().flatten().cloned().collect()
        };
        dedup_by_address(merged)
    }

    /// One tick of a fixed-cadence loop. The shape rotates with a global
    /// monotonically increasing counter mod 4, spreading load type as
    /// well as timing.
    async fn run_fixed_step(self: &Arc<Self>, loop_index: usize) {
        let step = self.scan_counter.fetch_add(1, Ordering::SeqCst);
        let lane = format!("scan-{loop_index}");

        self.active_scans.fetch_add(1, Ordering::SeqCst);

        let pairs = match step % 4 {
            0 => {
                let query = LIST_QUERIES[(step as usize / 4) % LIST_QUERIES.len()];
                let data = self.pool.fetch_comprehensive(query).await;
                dedup_by_address(
                    data.tokens
                        .iter()
                        .chain(data.trending.iter())
                        .cloned()
                        .collect(),
                )
            }
            1 => {
                let sample = self.catalog.random_subset(self.cfg.random_batch_size);
                self.pool.fetch_multiple_endpoints(&sample).await
            }
            2 => {
                let query = LIST_QUERIES[(step as usize) % LIST_QUERIES.len()];
                self.run_single(TaskKind::FetchList {
                    query: query.to_string(),
                })
                .await
            }
            _ => self.run_single(TaskKind::FetchTrending).await,
        };

        self.finish_step(&lane, pairs).await;
        self.active_scans.fetch_sub(1, Ordering::SeqCst);
    }

    /// One tick of the rotation loop: exactly one catalog endpoint,
    /// walking the catalog in order.
    async fn run_rotation_step(self: &Arc<Self>) {
        let idx = self.rotation_cursor.fetch_add(1, Ordering::SeqCst);
        let Some(endpoint) = self.catalog.at_cycle(idx).cloned() else {
            debug!("endpoint catalog is empty; rotation tick skipped");
            return;
        };
        let lane = format!("endpoint-{}", endpoint.name);

        self.active_scans.fetch_add(1, Ordering::SeqCst);

        let pairs = self
            .run_single(TaskKind::FetchEndpoint {
                path: endpoint.path,
            })
            .await;

        self.finish_step(&lane, pairs).await;
        self.active_scans.fetch_sub(1, Ordering::SeqCst);
    }

    async fn run_quick_trending_step(self: &Arc<Self>) {
        self.active_scans.fetch_add(1, Ordering::SeqCst);
        let pairs = self.run_single(TaskKind::FetchTrending).await;
        self.finish_step("quick-trending", pairs).await;
        self.active_scans.fetch_sub(1, Ordering::SeqCst);
    }

    async fn run_reduced_batch_step(self: &Arc<Self>) {
        self.active_scans.fetch_add(1, Ordering::SeqCst);
        let sample = self.catalog.random_subset(self.cfg.reduced_batch_size);
        let pairs = self.pool.fetch_multiple_endpoints(&sample).await;
        self.finish_step("reduced-batch", pairs).await;
        self.active_scans.fetch_sub(1, Ordering::SeqCst);
    }

    /// Single-task scan body with the scanner's error boundary: failures
    /// are logged and converted to an empty contribution.
    async fn run_single(self: &Arc<Self>, kind: TaskKind) -> Vec<Pair> {
        match self.pool.execute(kind).await {
            Ok(pairs) => pairs,
            Err(e) => {
                warn!(error = %e, "scan step failed; contributing empty result");
                Vec::new()
            }
        }
    }

    /// Lane write + alert handoff. Empty results are substituted with the
    /// jittered seed set so consumers never observe a blocked state.
    async fn finish_step(self: &Arc<Self>, lane: &str, pairs: Vec<Pair>) {
        let pairs = if pairs.is_empty() {
            debug!(lane, "empty scan result; substituting seed data");
            seed::fallback_pairs()
        } else {
            pairs
        };

        debug!(lane, pairs = pairs.len(), "lane updated");
        self.lanes.lock().insert(lane.to_string(), pairs.clone());

        // Best-effort: the pipeline absorbs sink failures internally.
        self.pipeline.process(&pairs).await;
    }
}
