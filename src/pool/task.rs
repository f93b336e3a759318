use std::collections::BTreeMap;

use uuid::Uuid;

use crate::time::now_ms;

pub const CACHE_PREFIX: &str = "pw-cache:";

/// The three fetch shapes the pool executes. Each variant carries exactly
/// the parameters that shape needs, so a malformed dispatch is rejected at
/// construction time rather than at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Large single-list fetch for a search query.
    FetchList { query: String },

    /// Trending pairs fetch.
    FetchTrending,

    /// One specific catalog endpoint, addressed by its request path.
    FetchEndpoint { path: String },
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::FetchList { .. } => "list",
            TaskKind::FetchTrending => "trending",
            TaskKind::FetchEndpoint { .. } => "endpoint",
        }
    }

    /// Deterministic cache key: fixed prefix, kind name, then the
    /// parameters serialized with sorted keys. Two semantically different
    /// queries never collide; a repeated query always maps to the same key.
    pub fn cache_key(&self) -> String {
        let mut params = BTreeMap::new();
        match self {
            TaskKind::FetchList { query } => {
                params.insert("query", query.as_str());
            }
            TaskKind::FetchTrending => {}
            TaskKind::FetchEndpoint { path } => {
                params.insert("path", path.as_str());
            }
        }

        // BTreeMap serializes in key order, which keeps the encoding
        // canonical regardless of construction order.
        let canonical = serde_json::to_string(&params).unwrap_or_else(|_| "{}".to_string());
        format!("{}{}-{}", CACHE_PREFIX, self.name(), canonical)
    }
}

/// A unit of work accepted by the pool. Owned exclusively by the pool
/// from submission until it resolves, rejects, or times out.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub kind: TaskKind,
    pub submitted_ms: u64,
}

impl Task {
    pub fn new(kind: TaskKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            submitted_ms: now_ms(),
        }
    }
}

/// Cache key for a multi-endpoint batch. The endpoint set is sorted so the
/// same set always maps to the same key regardless of call order.
pub fn batch_cache_key(paths: &[String]) -> String {
    let mut sorted: Vec<&str> = paths.iter().map(|p| p.as_str()).collect();
    sorted.sort_unstable();

    let canonical = serde_json::to_string(&sorted).unwrap_or_else(|_| "[]".to_string());
    format!("{CACHE_PREFIX}multi-{canonical}")
}

/// Cache key for the composite list+trending fetch.
pub fn comprehensive_cache_key() -> String {
    format!("{CACHE_PREFIX}comprehensive")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_for_repeated_queries() {
        let a = TaskKind::FetchList {
            query: "solana".into(),
        };
        let b = TaskKind::FetchList {
            query: "solana".into(),
        };
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn cache_key_separates_kinds_and_params() {
        let list = TaskKind::FetchList { query: "x".into() };
        let endpoint = TaskKind::FetchEndpoint { path: "x".into() };
        let trending = TaskKind::FetchTrending;

        assert_ne!(list.cache_key(), endpoint.cache_key());
        assert_ne!(list.cache_key(), trending.cache_key());

        let other = TaskKind::FetchList { query: "y".into() };
        assert_ne!(list.cache_key(), other.cache_key());
    }

    #[test]
    fn batch_key_is_order_independent() {
        let a = batch_cache_key(&["b".into(), "a".into()]);
        let b = batch_cache_key(&["a".into(), "b".into()]);
        assert_eq!(a, b);

        let c = batch_cache_key(&["a".into()]);
        assert_ne!(a, c);
    }
}
