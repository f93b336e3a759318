use std::sync::Arc;

use pulsewatch::{
    alerts::{AlertPipeline, AlertSink, DesktopLogSink, TelegramSink},
    cache::ResponseCache,
    cache::repository_sqlx::SqlxCacheRepository,
    catalog::EndpointCatalog,
    config::AppConfig,
    db::Db,
    logger::init_tracing,
    market::client::DexClient,
    pool::WorkerPool,
    scanner::{ContinuousScanner, ScannerConfig},
    signal::{Signal, SignalConfig},
};
use std::time::Duration;

/// Connects the local store, runs migrations, and wires the two-level
/// response cache on top of it.
async fn init_cache(cfg: &AppConfig) -> anyhow::Result<Arc<ResponseCache>> {
    let db = Db::connect(&cfg.database_url).await?;
    db.migrate().await?;

    let repo = Arc::new(SqlxCacheRepository::new(db.pool.as_ref().clone()));
    Ok(Arc::new(ResponseCache::new(repo, cfg.cache_window())))
}

/// Builds the alert pipeline: Telegram when credentials are configured,
/// the desktop log sink always.
fn init_alerts(cfg: &AppConfig) -> anyhow::Result<Arc<AlertPipeline>> {
    let mut sinks: Vec<Arc<dyn AlertSink>> = Vec::new();

    match (&cfg.telegram_bot_token, &cfg.telegram_chat_id) {
        (Some(token), Some(chat_id)) => {
            sinks.push(Arc::new(TelegramSink::new(token.clone(), chat_id.clone())?));
        }
        _ => {
            tracing::info!("telegram credentials absent; log sink only");
        }
    }
    sinks.push(Arc::new(DesktopLogSink));

    Ok(Arc::new(AlertPipeline::new(
        Signal::new(SignalConfig::default()),
        sinks,
        Duration::from_millis(cfg.alert_send_gap_ms),
        cfg.alert_cooldown_ms,
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sqlx::any::install_default_drivers();

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    tracing::info!("Starting pulsewatch scanner...");

    let cfg = AppConfig::from_env();

    let cache = init_cache(&cfg).await?;

    let client = Arc::new(DexClient::new(
        cfg.api_base_url.clone(),
        cfg.fetch_attempts,
        Duration::from_millis(cfg.backoff_base_ms),
    )?);

    let pool = WorkerPool::new(
        client,
        cache,
        cfg.worker_count,
        cfg.task_timeout(),
        cfg.queue_capacity,
    );

    let pipeline = init_alerts(&cfg)?;

    let scanner = ContinuousScanner::new(
        Arc::clone(&pool),
        EndpointCatalog::standard(),
        pipeline,
        ScannerConfig::from_app(&cfg),
    );

    scanner.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    scanner.stop();
    pool.terminate();

    Ok(())
}
