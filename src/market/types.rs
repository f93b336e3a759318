use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Buy/sell transaction counts inside one timeframe bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxnCount {
    #[serde(default)]
    pub buys: u64,
    #[serde(default)]
    pub sells: u64,
}

/// Per-timeframe buckets as reported upstream (5m / 1h / 6h / 24h).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeframes<T> {
    #[serde(default)]
    pub m5: Option<T>,
    #[serde(default)]
    pub h1: Option<T>,
    #[serde(default)]
    pub h6: Option<T>,
    #[serde(default)]
    pub h24: Option<T>,
}

impl<T> Default for Timeframes<T> {
    fn default() -> Self {
        Self {
            m5: None,
            h1: None,
            h6: None,
            h24: None,
        }
    }
}

/// Token descriptor inside a pair record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenInfo {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
}

/// Pool liquidity snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Liquidity {
    #[serde(default)]
    pub usd: Option<f64>,
    #[serde(default)]
    pub base: Option<f64>,
    #[serde(default)]
    pub quote: Option<f64>,
}

/// One tradable market as reported by the upstream API.
///
/// Identity: two pairs are the same entity iff their pair addresses are
/// equal (case-sensitive exact match). All other fields are advisory
/// market data and may differ between fetches of the same pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pair {
    pub pair_address: String,

    #[serde(default)]
    pub chain_id: Option<String>,
    #[serde(default)]
    pub dex_id: Option<String>,

    #[serde(default)]
    pub base_token: TokenInfo,
    #[serde(default)]
    pub quote_token: TokenInfo,

    /// Upstream serializes prices as decimal strings.
    #[serde(default)]
    pub price_usd: Option<String>,

    #[serde(default)]
    pub txns: Timeframes<TxnCount>,
    #[serde(default)]
    pub volume: Timeframes<f64>,
    #[serde(default)]
    pub price_change: Timeframes<f64>,

    #[serde(default)]
    pub liquidity: Option<Liquidity>,
    #[serde(default)]
    pub fdv: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,

    /// Pair creation time (ms since epoch), when the upstream knows it.
    #[serde(default)]
    pub pair_created_at: Option<u64>,
}

impl Pair {
    pub fn price_usd_f64(&self) -> Option<f64> {
        self.price_usd.as_deref().and_then(|p| p.parse().ok())
    }

    pub fn symbol_pair(&self) -> String {
        format!("{}/{}", self.base_token.symbol, self.quote_token.symbol)
    }
}

/// JSON envelope returned by the upstream pair endpoints.
/// `pairs` may be null when the query matches nothing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairsEnvelope {
    #[serde(default)]
    pub pairs: Option<Vec<Pair>>,
}

impl PairsEnvelope {
    pub fn into_pairs(self) -> Vec<Pair> {
        self.pairs.unwrap_or_default()
    }
}

/// Deduplicate by pair address, keeping the first occurrence of each
/// address and preserving input order otherwise.
pub fn dedup_by_address(pairs: Vec<Pair>) -> Vec<Pair> {
    let mut seen = HashSet::with_capacity(pairs.len());
    pairs
        .into_iter()
        .filter(|p| seen.insert(p.pair_address.clone()))
        .collect()
}
