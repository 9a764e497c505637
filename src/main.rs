use std::sync::Arc;
use std::time::Duration;

use mexc_sniper::exchange::factory::build_exchange;
use mexc_sniper::services::journal::TradeJournal;
use mexc_sniper::{AppConfig, AutoSniper, EventBus, SnipeOutcome};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Setup Logging (RUST_LOG overrides the default level)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting MEXC sniper...");

    // Load Configuration
    let config = AppConfig::load()?;
    info!(
        "Loaded configuration: exchange={} targets={} tp={}% sl={}%",
        config.exchange,
        config.targets.len(),
        config.monitor.take_profit_percent,
        config.monitor.stop_loss_percent
    );

    let bus = EventBus::new(1024);
    let journal = TradeJournal::new(&config.journal_path);
    journal.start(&bus);

    let exchange = build_exchange(&config)?;
    let sniper = Arc::new(AutoSniper::new(exchange, bus.clone(), &config));

    {
        let sniper = Arc::clone(&sniper);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, triggering emergency stop");
                sniper.emergency_stop();
            }
        });
    }

    if config.targets.is_empty() {
        warn!("No targets configured, nothing to do");
        return Ok(());
    }

    for outcome in sniper.run(config.targets.clone()).await {
        match outcome {
            SnipeOutcome::Executed(result) if result.success() => info!(
                "Target {} filled: order {}",
                result.symbol(),
                result.order_id().unwrap_or_default()
            ),
            SnipeOutcome::Executed(result) => error!(
                "Target {} failed: {}",
                result.symbol(),
                result.error().unwrap_or_default()
            ),
            SnipeOutcome::Skipped { target_id, reason } => info!("Target {} skipped: {}", target_id, reason),
            SnipeOutcome::Cancelled { target_id } => info!("Target {} cancelled", target_id),
        }
    }

    // Keep running while positions are monitored or a close is still in flight.
    let shutdown = sniper.shutdown_token();
    while sniper.monitor().active_count() > 0 || !journal.summary().open_positions.is_empty() {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
    }

    let summary = journal.summary();
    info!(
        "Done: {} executions ({} filled), {} positions closed, realized pnl {:.4}",
        summary.total_executions,
        summary.successful_executions,
        summary.positions_closed,
        summary.realized_pnl
    );
    Ok(())
}
