//! Time-windowed response cache.
//!
//! Two levels, mirroring the store-over-repository split used elsewhere in
//! this codebase:
//!   • an in-memory map answering the hot path synchronously,
//!   • a write-through persistent repository so cached responses survive
//!     restarts.
//!
//! Expiry is lazy: a read of an expired entry deletes it from both levels
//! and reports a miss. A read never returns an entry past its expiry.
//! `sweep` scans the whole namespace and purges expired entries; it is
//! triggered opportunistically on each pool `execute`. Sweep cost is
//! O(namespace size) — acceptable at tens of keys, a known scaling limit.

pub mod repository;
pub mod repository_sqlx;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::cache::repository::{CacheRepository, StoredEntry};
use crate::logger::warn_if_slow;
use crate::market::types::Pair;
use crate::time::now_ms;

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Vec<Pair>,
    expires_ms: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_ms < now
    }
}

pub struct ResponseCache {
    repo: Arc<dyn CacheRepository>,
    mem: Mutex<HashMap<String, CacheEntry>>,
    window_ms: u64,
}

impl ResponseCache {
    pub fn new(repo: Arc<dyn CacheRepository>, window: Duration) -> Self {
        Self {
            repo,
            mem: Mutex::new(HashMap::new()),
            window_ms: window.as_millis() as u64,
        }
    }

    pub fn len_mem(&self) -> usize {
        self.mem.lock().len()
    }

    /// Cache lookup. Miss on absent or expired; an expired entry is purged
    /// from both levels on read. A memory miss falls back to the
    /// repository and rehydrates the memory level on hit.
    pub async fn get(&self, key: &str) -> Option<Vec<Pair>> {
        let now = now_ms();

        let mem_state = {
            let mut mem = self.mem.lock();
            match mem.get(key) {
                Some(e) if e.is_expired(now) => {
                    mem.remove(key);
                    MemLookup::Expired
                }
                Some(e) => MemLookup::Hit(e.payload.clone()),
                None => MemLookup::Miss,
            }
        };

        match mem_state {
            MemLookup::Hit(payload) => {
                debug!(key, "cache hit (memory)");
                return Some(payload);
            }
            MemLookup::Expired => {
                if let Err(e) = self.repo.delete(key).await {
                    warn!(key, error = %e, "failed to purge expired cache row");
                }
                return None;
            }
            MemLookup::Miss => {}
        }

        // Memory miss: consult the persistent level.
        let stored = match self.repo.get(key).await {
            Ok(s) => s,
            Err(e) => {
                // Persistence trouble must never fail the fetch path.
                warn!(key, error = %e, "cache repository read failed; treating as miss");
                return None;
            }
        };

        let stored = stored?;

        if stored.is_expired(now) {
            if let Err(e) = self.repo.delete(key).await {
                warn!(key, error = %e, "failed to purge expired cache row");
            }
            return None;
        }

        match serde_json::from_str::<Vec<Pair>>(&stored.payload) {
            Ok(payload) => {
                debug!(key, "cache hit (persistent); rehydrating memory level");
                self.mem.lock().insert(
                    key.to_string(),
                    CacheEntry {
                        payload: payload.clone(),
                        expires_ms: stored.expires_ms,
                    },
                );
                Some(payload)
            }
            Err(e) => {
                warn!(key, error = %e, "malformed persisted cache payload; deleting");
                let _ = self.repo.delete(key).await;
                None
            }
        }
    }

    /// Write-through put with `expires = now + window`.
    #[instrument(skip(self, payload), target = "cache", fields(pairs = payload.len()))]
    pub async fn put(&self, key: &str, payload: &[Pair]) {
        let now = now_ms();
        let expires_ms = now + self.window_ms;

        self.mem.lock().insert(
            key.to_string(),
            CacheEntry {
                payload: payload.to_vec(),
                expires_ms,
            },
        );

        let encoded = match serde_json::to_string(payload) {
            Ok(s) => s,
            Err(e) => {
                warn!(key, error = %e, "failed to encode cache payload; memory level only");
                return;
            }
        };

        let entry = StoredEntry {
            payload: encoded,
            written_ms: now,
            expires_ms,
        };

        let persisted = warn_if_slow("cache_put", Duration::from_millis(100), async {
            self.repo.put(key, &entry).await
        })
        .await;

        if let Err(e) = persisted {
            warn!(key, error = %e, "cache write-through failed; memory level only");
        }
    }

    /// Purges every expired entry from both levels.
    pub async fn sweep(&self) {
        let now = now_ms();

        let purged_mem = {
            let mut mem = self.mem.lock();
            let before = mem.len();
            mem.retain(|_, e| !e.is_expired(now));
            before - mem.len()
        };

        match self.repo.sweep_expired(now).await {
            Ok(purged_repo) => {
                if purged_mem > 0 || purged_repo > 0 {
                    debug!(purged_mem, purged_repo, "cache sweep purged expired entries");
                }
            }
            Err(e) => warn!(error = %e, "persistent cache sweep failed"),
        }
    }
}

enum MemLookup {
    Hit(Vec<Pair>),
    Expired,
    Miss,
}
