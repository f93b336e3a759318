use async_trait::async_trait;

/// A persisted cache row: JSON payload plus expiry bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub payload: String,
    pub written_ms: u64,
    pub expires_ms: u64,
}

impl StoredEntry {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_ms < now_ms
    }
}

/// Persistence seam for the response cache. Responsible only for durable
/// key-value storage; expiry policy lives in `ResponseCache`.
#[async_trait]
pub trait CacheRepository: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<StoredEntry>>;

    async fn put(&self, key: &str, entry: &StoredEntry) -> anyhow::Result<()>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Deletes every entry whose expiry has passed. Returns the number of
    /// rows removed. Cost is O(namespace size).
    async fn sweep_expired(&self, now_ms: u64) -> anyhow::Result<u64>;
}

/// In-memory repository for tests and ephemeral runs without a database.
#[derive(Default)]
pub struct MemoryCacheRepository {
    rows: parking_lot::Mutex<std::collections::HashMap<String, StoredEntry>>,
}

impl MemoryCacheRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

#[async_trait]
impl CacheRepository for MemoryCacheRepository {
    async fn get(&self, key: &str) -> anyhow::Result<Option<StoredEntry>> {
        Ok(self.rows.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, entry: &StoredEntry) -> anyhow::Result<()> {
        self.rows.lock().insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.rows.lock().remove(key);
        Ok(())
    }

    async fn sweep_expired(&self, now_ms: u64) -> anyhow::Result<u64> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|_, e| !e.is_expired(now_ms));
        Ok((before - rows.len()) as u64)
    }
}
