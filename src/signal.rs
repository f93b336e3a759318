//! Bullish-momentum signal predicate.
//!
//! The scoring formula is a hand-tuned weighted sum over short-horizon
//! buy pressure, price momentum and volume. It is deliberately opaque to
//! the orchestration core: the scanner only asks "is this pair a signal"
//! and never inspects the score. One consistent version of the formula
//! lives here; thresholds are configuration, not gospel.

use serde::{Deserialize, Serialize};

use crate::market::types::Pair;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Weight of the 5-minute buy/sell pressure component.
    pub buy_pressure_weight: f64,
    /// Weight of the 5m/1h price-change momentum component.
    pub momentum_weight: f64,
    /// Weight of the 24h volume component.
    pub volume_weight: f64,

    /// Volume (USD, 24h) at which the volume component saturates.
    pub volume_saturation: f64,

    /// Minimum 24h volume for a pair to be considered at all.
    pub min_volume_h24: f64,
    /// Minimum pool liquidity in USD, when the upstream reports it.
    pub min_liquidity_usd: f64,

    /// Score at or above which a pair counts as a bullish signal.
    pub threshold: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            buy_pressure_weight: 0.4,
            momentum_weight: 0.4,
            volume_weight: 0.2,
            volume_saturation: 100_000.0,
            min_volume_h24: 10_000.0,
            min_liquidity_usd: 5_000.0,
            threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Signal {
    cfg: SignalConfig,
}

impl Signal {
    pub fn new(cfg: SignalConfig) -> Self {
        Self { cfg }
    }

    /// The opaque predicate consumed by the scanner.
    pub fn is_signal(&self, pair: &Pair) -> bool {
        self.score(pair) >= self.cfg.threshold
    }

    /// Weighted bullishness score in [0, 1].
    pub fn score(&self, pair: &Pair) -> f64 {
        let volume_h24 = pair.volume.h24.unwrap_or(0.0);
        if volume_h24 < self.cfg.min_volume_h24 {
            return 0.0;
        }

        if let Some(liq) = pair.liquidity.as_ref().and_then(|l| l.usd) {
            if liq < self.cfg.min_liquidity_usd {
                return 0.0;
            }
        }

        let buy_pressure = pair
            .txns
            .m5
            .as_ref()
            .map(|t| {
                let total = t.buys + t.sells;
                if total == 0 {
                    0.0
                } else {
                    t.buys as f64 / total as f64
                }
            })
            .unwrap_or(0.0);

        // Momentum: positive short-horizon change, 5m weighted over 1h,
        // each clamped so a single spike cannot dominate.
        let m5 = pair.price_change.m5.unwrap_or(0.0).clamp(0.0, 10.0) / 10.0;
        let h1 = pair.price_change.h1.unwrap_or(0.0).clamp(0.0, 20.0) / 20.0;
        let momentum = 0.6 * m5 + 0.4 * h1;

        let volume = (volume_h24 / self.cfg.volume_saturation).min(1.0);

        self.cfg.buy_pressure_weight * buy_pressure
            + self.cfg.momentum_weight * momentum
            + self.cfg.volume_weight * volume
    }
}
