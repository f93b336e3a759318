//! Best-effort alert delivery.
//!
//! The scanner hands every completed scan's pair list to the pipeline;
//! the pipeline filters it through the signal predicate, suppresses pairs
//! alerted within the cooldown window, and fans the rest out to the
//! configured sinks. Sink failures are logged and absorbed — delivery is
//! fire-and-forget and never aborts a scan step. Consecutive deliveries
//! are paced to stay under the sinks' own rate limits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::market::types::Pair;
use crate::signal::Signal;
use crate::time::now_ms;

/// One alert-worthy finding, formatted for delivery.
#[derive(Debug, Clone)]
pub struct Alert {
    pub title: String,
    pub body: String,
    pub markdown: String,
    /// Pair address; sinks may use it to collapse duplicate notifications.
    pub dedupe_tag: String,
}

/// Delivery seam. Implementations own their transport and error formats.
#[async_trait]
pub trait AlertSink: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn send(&self, alert: &Alert) -> anyhow::Result<()>;
}

/// Telegram bot delivery over HTTPS POST.
pub struct TelegramSink {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(bot_token: String, chat_id: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            bot_token,
            chat_id,
        })
    }
}

#[async_trait]
impl AlertSink for TelegramSink {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, alert: &Alert) -> anyhow::Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);

        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": alert.markdown,
                "parse_mode": "Markdown",
                "disable_web_page_preview": true,
            }))
            .send()
            .await?
            .error_for_status()?;

        debug!(status = resp.status().as_u16(), "telegram alert delivered");
        Ok(())
    }
}

/// Stand-in for the desktop notification surface: emits the alert into
/// the structured log where a desktop shell would display it.
pub struct DesktopLogSink;

#[async_trait]
impl AlertSink for DesktopLogSink {
    fn name(&self) -> &'static str {
        "desktop-log"
    }

    async fn send(&self, alert: &Alert) -> anyhow::Result<()> {
        info!(
            target: "desktop_notification",
            title = %alert.title,
            body = %alert.body,
            tag = %alert.dedupe_tag,
            "bullish signal"
        );
        Ok(())
    }
}

pub struct AlertPipeline {
    signal: Signal,
    sinks: Vec<Arc<dyn AlertSink>>,
    send_gap: Duration,
    cooldown_ms: u64,
    /// Last alert time per pair address.
    recent: Mutex<HashMap<String, u64>>,
}

impl AlertPipeline {
    pub fn new(
        signal: Signal,
        sinks: Vec<Arc<dyn AlertSink>>,
        send_gap: Duration,
        cooldown_ms: u64,
    ) -> Self {
        Self {
            signal,
            sinks,
            send_gap,
            cooldown_ms,
            recent: Mutex::new(HashMap::new()),
        }
    }

    /// Scans `pairs` for alert-worthy entries and delivers them.
    /// Returns the number of pairs alerted.
    pub async fn process(&self, pairs: &[Pair]) -> usize {
        let now = now_ms();

        let mut to_alert = Vec::new();
        {
            let mut recent = self.recent.lock();
            // Entries past the cooldown can never suppress again; prune
            // them so the map stays bounded by the active pair set.
            recent.retain(|_, last| now.saturating_sub(*last) < self.cooldown_ms);

            for pair in pairs {
                if !self.signal.is_signal(pair) {
                    continue;
                }

                match recent.get(&pair.pair_address) {
                    Some(last) if now.saturating_sub(*last) < self.cooldown_ms => {
                        debug!(pair = %pair.pair_address, "signal suppressed by cooldown");
                    }
                    _ => {
                        recent.insert(pair.pair_address.clone(), now);
                        to_alert.push(pair.clone());
                    }
                }
            }
        }

        let mut sent = 0;
        for pair in &to_alert {
            let alert = build_alert(pair);

            for sink in &self.sinks {
                // Best-effort: a failing sink never blocks the others.
                if let Err(e) = sink.send(&alert).await {
                    warn!(sink = sink.name(), pair = %alert.dedupe_tag, error = %e, "alert delivery failed");
                }
            }

            sent += 1;

            if sent < to_alert.len() {
                tokio::time::sleep(self.send_gap).await;
            }
        }

        sent
    }
}

fn build_alert(pair: &Pair) -> Alert {
    let symbol = pair.symbol_pair();
    let price = pair.price_usd.as_deref().unwrap_or("?");
    let change_m5 = pair.price_change.m5.unwrap_or(0.0);
    let volume_h24 = pair.volume.h24.unwrap_or(0.0);

    Alert {
        title: format!("Bullish signal: {symbol}"),
        body: format!("${price} | 5m {change_m5:+.1}% | 24h vol ${volume_h24:.0}"),
        markdown: format!(
            "*Bullish signal* `{symbol}`\nPrice: ${price}\n5m change: {change_m5:+.1}%\n24h volume: ${volume_h24:.0}\nPair: `{}`",
            pair.pair_address
        ),
        dedupe_tag: pair.pair_address.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::types::{Liquidity, Timeframes, TokenInfo, TxnCount};
    use crate::signal::SignalConfig;

    fn hot_pair(address: &str) -> Pair {
        Pair {
            pair_address: address.to_string(),
            chain_id: None,
            dex_id: None,
            base_token: TokenInfo {
                symbol: "HOT".into(),
                ..Default::default()
            },
            quote_token: TokenInfo {
                symbol: "USDC".into(),
                ..Default::default()
            },
            price_usd: Some("0.42".into()),
            txns: Timeframes {
                m5: Some(TxnCount { buys: 90, sells: 10 }),
                ..Default::default()
            },
            volume: Timeframes {
                h24: Some(250_000.0),
                ..Default::default()
            },
            price_change: Timeframes {
                m5: Some(8.0),
                h1: Some(15.0),
                ..Default::default()
            },
            liquidity: Some(Liquidity {
                usd: Some(80_000.0),
                base: None,
                quote: None,
            }),
            fdv: None,
            market_cap: None,
            pair_created_at: None,
        }
    }

    fn quiet_pair(address: &str) -> Pair {
        let mut p = hot_pair(address);
        p.volume.h24 = Some(100.0);
        p
    }

    struct RecordingSink {
        tags: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, alert: &Alert) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("sink down");
            }
            self.tags.lock().push(alert.dedupe_tag.clone());
            Ok(())
        }
    }

    fn pipeline(sinks: Vec<Arc<dyn AlertSink>>) -> AlertPipeline {
        AlertPipeline::new(
            Signal::new(SignalConfig::default()),
            sinks,
            Duration::from_millis(0),
            60_000,
        )
    }

    #[tokio::test]
    async fn quiet_pairs_produce_no_alerts() {
        let sink = Arc::new(RecordingSink {
            tags: Mutex::new(vec![]),
            fail: false,
        });
        let pipe = pipeline(vec![sink.clone()]);

        let sent = pipe.process(&[quiet_pair("A"), quiet_pair("B")]).await;

        assert_eq!(sent, 0);
        assert!(sink.tags.lock().is_empty());
    }

    #[tokio::test]
    async fn cooldown_suppresses_repeat_alerts() {
        let sink = Arc::new(RecordingSink {
            tags: Mutex::new(vec![]),
            fail: false,
        });
        let pipe = pipeline(vec![sink.clone()]);

        assert_eq!(pipe.process(&[hot_pair("X")]).await, 1);
        assert_eq!(pipe.process(&[hot_pair("X")]).await, 0);

        assert_eq!(sink.tags.lock().clone(), vec!["X".to_string()]);
    }

    #[tokio::test]
    async fn failing_sink_does_not_block_others() {
        let broken: Arc<dyn AlertSink> = Arc::new(RecordingSink {
            tags: Mutex::new(vec![]),
            fail: true,
        });
        let good = Arc::new(RecordingSink {
            tags: Mutex::new(vec![]),
            fail: false,
        });
        let pipe = pipeline(vec![broken, good.clone()]);

        let sent = pipe.process(&[hot_pair("X"), hot_pair("Y")]).await;

        assert_eq!(sent, 2);
        assert_eq!(good.tags.lock().len(), 2);
    }

    #[tokio::test]
    async fn expired_cooldown_entries_are_pruned_and_can_realert() {
        let sink = Arc::new(RecordingSink {
            tags: Mutex::new(vec![]),
            fail: false,
        });
        let pipe = AlertPipeline::new(
            Signal::new(SignalConfig::default()),
            vec![sink.clone()],
            Duration::from_millis(0),
            50, // cooldown_ms
        );

        assert_eq!(pipe.process(&[hot_pair("X")]).await, 1);
        assert_eq!(pipe.recent.lock().len(), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;

        // The stale entry is dropped on the next pass, not retained
        // forever, and the pair is eligible again.
        assert_eq!(pipe.process(&[hot_pair("Y")]).await, 1);
        {
            let recent = pipe.recent.lock();
            assert_eq!(recent.len(), 1);
            assert!(recent.contains_key("Y"));
        }

        assert_eq!(pipe.process(&[hot_pair("X")]).await, 1);
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn desktop_sink_emits_a_structured_log_line() {
        DesktopLogSink
            .send(&build_alert(&hot_pair("X")))
            .await
            .unwrap();

        assert!(logs_contain("bullish signal"));
    }

    #[tokio::test]
    async fn distinct_pairs_each_alert_once() {
        let sink = Arc::new(RecordingSink {
            tags: Mutex::new(vec![]),
            fail: false,
        });
        let pipe = pipeline(vec![sink.clone()]);

        let sent = pipe
            .process(&[hot_pair("X"), hot_pair("Y"), quiet_pair("Z")])
            .await;

        assert_eq!(sent, 2);
        let tags = sink.tags.lock().clone();
        assert!(tags.contains(&"X".to_string()));
        assert!(tags.contains(&"Y".to_string()));
    }
}
