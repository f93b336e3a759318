use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use crate::error::FetchError;
use crate::market::types::{Pair, PairsEnvelope};
use crate::pool::task::TaskKind;

/// Network seam for the worker pool. Implementations run one fetch shape
/// to completion; retry policy is theirs, concurrency is the pool's.
#[async_trait]
pub trait PairFetcher: Send + Sync + 'static {
    async fn fetch(&self, kind: &TaskKind) -> Result<Vec<Pair>, FetchError>;
}

/// Request header profiles rotated round-robin per outbound request.
/// This only varies headers — there is no network-level proxying.
const HEADER_PROFILES: &[(&str, &str)] = &[
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
        "en-US,en;q=0.9",
    ),
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        "en-GB,en;q=0.8",
    ),
    (
        "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
        "en-US,en;q=0.7",
    ),
];

/// HTTP client for the upstream market-data API.
#[derive(Debug)]
pub struct DexClient {
    http: Client,
    base_url: String,
    attempts: u32,
    backoff_base: Duration,
    profile_cursor: AtomicUsize,
}

impl DexClient {
    pub fn new(base_url: String, attempts: u32, backoff_base: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            attempts,
            backoff_base,
            profile_cursor: AtomicUsize::new(0),
        })
    }

    /// Maps a task shape onto its upstream request path.
    fn path_for(kind: &TaskKind) -> String {
        match kind {
            TaskKind::FetchList { query } => format!("search?q={query}"),
            TaskKind::FetchTrending => "pairs/trending".to_string(),
            TaskKind::FetchEndpoint { path } => path.clone(),
        }
    }

    fn next_profile(&self) -> (&'static str, &'static str) {
        let i = self.profile_cursor.fetch_add(1, Ordering::Relaxed);
        HEADER_PROFILES[i % HEADER_PROFILES.len()]
    }

    #[instrument(skip(self), fields(path = %path), level = "debug")]
    async fn send_once(&self, path: &str) -> Result<Vec<Pair>, FetchError> {
        let url = format!("{}/{}", self.base_url, path);
        let (user_agent, accept_language) = self.next_profile();

        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .header(reqwest::header::ACCEPT_LANGUAGE, accept_language)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let envelope: PairsEnvelope = resp.json().await?;
        let pairs = envelope.into_pairs();

        debug!(pairs = pairs.len(), "upstream fetch decoded");
        Ok(pairs)
    }
}

#[async_trait]
impl PairFetcher for DexClient {
    async fn fetch(&self, kind: &TaskKind) -> Result<Vec<Pair>, FetchError> {
        let path = Self::path_for(kind);
        with_backoff(self.attempts, self.backoff_base, |attempt| {
            if attempt > 1 {
                warn!(path = %path, attempt, "retrying upstream fetch");
            }
            self.send_once(&path)
        })
        .await
    }
}

/// Runs `op` up to `attempts` times with exponential backoff (base, 2x,
/// 4x, ...). Retryable failures (transport, 5xx) wait and try again;
/// terminal failures (4xx) surface immediately.
pub async fn with_backoff<T, F, Fut>(
    attempts: u32,
    base: Duration,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, FetchError>>,
{
    let attempts = attempts.max(1);
    let mut last_status = None;

    for attempt in 1..=attempts {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => {
                last_status = e.status();

                if !e.is_retryable() {
                    return Err(e);
                }

                if attempt < attempts {
                    let delay = base * 2u32.saturating_pow(attempt - 1);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retryable fetch failure; backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(FetchError::RetriesExhausted {
        attempts,
        last_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test(start_paused = true)]
    async fn backoff_exhausts_after_three_5xx_attempts() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let out: Result<(), _> = with_backoff(3, Duration::from_secs(2), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::Status(503)) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 2s + 4s of backoff between the three attempts.
        assert_eq!(start.elapsed(), Duration::from_secs(6));

        match out {
            Err(FetchError::RetriesExhausted {
                attempts,
                last_status,
            }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last_status, Some(503));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_stops_immediately_on_4xx() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let out: Result<(), _> = with_backoff(3, Duration::from_secs(2), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::Status(404)) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(out, Err(FetchError::Status(404))));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_returns_first_success() {
        let calls = AtomicU32::new(0);

        let out = with_backoff(3, Duration::from_secs(2), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(FetchError::Status(500))
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;

        assert_eq!(out.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn header_profiles_rotate_round_robin() {
        let client = DexClient::new(
            "https://example.invalid/api".into(),
            3,
            Duration::from_secs(2),
        )
        .unwrap();

        let first = client.next_profile().0;
        let second = client.next_profile().0;
        let third = client.next_profile().0;
        let wrapped = client.next_profile().0;

        assert_ne!(first, second);
        assert_ne!(second, third);
        assert_eq!(first, wrapped);
    }

    #[test]
    fn task_kinds_map_to_distinct_paths() {
        let list = DexClient::path_for(&TaskKind::FetchList {
            query: "SOL".into(),
        });
        let trending = DexClient::path_for(&TaskKind::FetchTrending);
        let endpoint = DexClient::path_for(&TaskKind::FetchEndpoint {
            path: "search?q=PEPE".into(),
        });

        assert_eq!(list, "search?q=SOL");
        assert_eq!(trending, "pairs/trending");
        assert_eq!(endpoint, "search?q=PEPE");
    }
}
