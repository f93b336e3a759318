use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::{AnyPool, Row};

use crate::cache::repository::{CacheRepository, StoredEntry};

/// SQLx-backed implementation of CacheRepository.
/// Responsible only for persistence and row mapping.
pub struct SqlxCacheRepository {
    pool: AnyPool,
}

impl SqlxCacheRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheRepository for SqlxCacheRepository {
    async fn get(&self, key: &str) -> anyhow::Result<Option<StoredEntry>> {
        let row = sqlx::query(
            r#"
SELECT payload, written_ms, expires_ms
FROM response_cache
WHERE cache_key = ?;
"#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(row_to_entry(&r)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, entry: &StoredEntry) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO response_cache (cache_key, payload, written_ms, expires_ms)
VALUES (?, ?, ?, ?)
ON CONFLICT(cache_key) DO UPDATE SET
  payload = excluded.payload,
  written_ms = excluded.written_ms,
  expires_ms = excluded.expires_ms;
"#,
        )
        .bind(key)
        .bind(&entry.payload)
        .bind(u64_to_i64(entry.written_ms)?)
        .bind(u64_to_i64(entry.expires_ms)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        sqlx::query(r#"DELETE FROM response_cache WHERE cache_key = ?;"#)
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn sweep_expired(&self, now_ms: u64) -> anyhow::Result<u64> {
        let res = sqlx::query(r#"DELETE FROM response_cache WHERE expires_ms < ?;"#)
            .bind(u64_to_i64(now_ms)?)
            .execute(&self.pool)
            .await?;

        Ok(res.rows_affected())
    }
}

/* =========================
Row mapping + conversions
========================= */

fn row_to_entry(r: &sqlx::any::AnyRow) -> anyhow::Result<StoredEntry> {
    Ok(StoredEntry {
        payload: r.get::<String, _>("payload"),
        written_ms: i64_to_u64(r.get("written_ms"))?,
        expires_ms: i64_to_u64(r.get("expires_ms"))?,
    })
}

fn i64_to_u64(v: i64) -> anyhow::Result<u64> {
    if v < 0 {
        return Err(anyhow!("negative i64 where u64 expected: {v}"));
    }
    Ok(v as u64)
}

fn u64_to_i64(v: u64) -> anyhow::Result<i64> {
    if v > i64::MAX as u64 {
        return Err(anyhow!("u64 too large for i64: {v}"));
    }
    Ok(v as i64)
}
