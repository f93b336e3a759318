use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Connection string for the local key-value store backing the
    /// response cache.
    pub database_url: String,

    /// Base URL of the upstream market-data API.
    pub api_base_url: String,

    // =========================
    // Worker pool configuration
    // =========================
    /// Number of executor slots in the worker pool.
    ///
    /// This is the hard concurrency bound for outbound fetches: at most
    /// this many requests are in flight at any instant. Tasks beyond the
    /// bound wait in the overflow queue.
    pub worker_count: usize,

    /// Per-task timeout in milliseconds.
    ///
    /// A task with no worker response within this window is rejected and
    /// its slot is freed for the next queued task. The underlying request
    /// is abandoned, not cancelled; a late reply is detected via the
    /// dispatch generation and discarded.
    pub task_timeout_ms: u64,

    /// Capacity of the overflow queue.
    ///
    /// `None` reproduces the original unbounded queue — under sustained
    /// overload queue depth grows without bound, which is logged as an
    /// operational risk at pool construction.
    ///
    /// `Some(n)` bounds the queue; when full, the newest submission is
    /// rejected with `TaskError::QueueFull`.
    pub queue_capacity: Option<usize>,

    // =========================
    // Cache configuration
    // =========================
    /// Sliding cache window in milliseconds.
    ///
    /// A repeated query inside this window is served from cache with no
    /// executor dispatch; after it elapses the next call refetches.
    pub cache_window_ms: u64,

    // =========================
    // Fetch retry configuration
    // =========================
    /// Maximum fetch attempts per request (first try included).
    pub fetch_attempts: u32,

    /// Base backoff delay in milliseconds; doubles per retry (2s, 4s, ...).
    pub backoff_base_ms: u64,

    // =========================
    // Scanner configuration
    // =========================
    /// Periods of the fixed-cadence scan loops, one entry per loop.
    ///
    /// The loops are independent timers; spreading their periods avoids a
    /// synchronized thundering herd against the upstream API. First runs
    /// are additionally staggered by one second per loop index.
    pub scan_intervals_ms: Vec<u64>,

    /// Period of the endpoint-rotation loop. Each tick fetches exactly one
    /// catalog endpoint, walking the catalog round-robin.
    pub rotation_interval_ms: u64,

    /// Period of the quick trending check.
    pub quick_trending_interval_ms: u64,

    /// Period of the reduced random-batch loop.
    pub reduced_batch_interval_ms: u64,

    /// Endpoints sampled per random-batch scan shape.
    pub random_batch_size: usize,

    /// Endpoints sampled per reduced-batch tick.
    pub reduced_batch_size: usize,

    // =========================
    // Alert configuration
    // =========================
    /// Minimum gap between consecutive sink deliveries, in milliseconds.
    ///
    /// Keeps the pipeline under the sinks' own rate limits.
    pub alert_send_gap_ms: u64,

    /// Per-pair alert cooldown in milliseconds. A pair that already fired
    /// an alert inside this window is not re-alerted.
    pub alert_cooldown_ms: u64,

    /// Telegram delivery credentials. When either is missing the Telegram
    /// sink is not constructed and alerts go to the log sink only.
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://pulsewatch_cache.db?mode=rwc".to_string());

        let api_base_url = std::env::var("API_BASE_URL")
            .unwrap_or_else(|_| "https://api.dexscreener.com/latest/dex".to_string());

        Self {
            database_url,
            api_base_url,

            // Pool defaults: small fixed pool, generous timeout.
            worker_count: env_usize("WORKER_COUNT", 4),
            task_timeout_ms: env_u64("TASK_TIMEOUT_MS", 15_000),
            queue_capacity: std::env::var("QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok()),

            cache_window_ms: env_u64("CACHE_WINDOW_MS", 30_000),

            fetch_attempts: 3,
            backoff_base_ms: 2_000,

            // Scanner defaults: five spread cadences plus the independent
            // rotation / quick / reduced loops.
            scan_intervals_ms: vec![30_000, 45_000, 60_000, 90_000, 120_000],
            rotation_interval_ms: env_u64("ROTATION_INTERVAL_MS", 20_000),
            quick_trending_interval_ms: 10_000,
            reduced_batch_interval_ms: 15_000,
            random_batch_size: 6,
            reduced_batch_size: 3,

            alert_send_gap_ms: 1_000,
            alert_cooldown_ms: 5 * 60_000,
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            telegram_chat_id: std::env::var("TELEGRAM_CHAT_ID").ok(),
        }
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn cache_window(&self) -> Duration {
        Duration::from_millis(self.cache_window_ms)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
