use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bus::EventBus;
use crate::config::{AppConfig, WindowConfig};
use crate::constants::events;
use crate::events::{CloseReason, Event, PositionClosed};
use crate::exchange::traits::TradingApi;
use crate::exchange::types::Side;
use crate::services::execution_window::{is_within_execution_window, wait_for_execution_window};
use crate::services::order_executor::{OrderExecutor, TradeParameters, TradeResult};
use crate::services::position_monitor::{CancelEvent, ExitHandler, PositionMonitor, TakeProfitEvent};
use crate::services::retry::RetryExecutor;
use crate::services::sizing::{PositionSizer, SizingOptions};

fn default_confidence() -> f64 {
    1.0
}

/// A listing to snipe, as produced by the detection pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnipeTarget {
    pub id: String,
    pub symbol: String,
    pub launch_time: DateTime<Utc>,
    #[serde(default)]
    pub position_size_hint: Option<f64>,
    #[serde(default = "default_confidence")]
    pub confidence_score: f64,
}

#[derive(Clone, Debug)]
pub enum SnipeOutcome {
    /// An order was attempted; the result says whether it filled.
    Executed(TradeResult),
    Skipped { target_id: String, reason: String },
    Cancelled { target_id: String },
}

/// Drives targets through window wait, sizing, execution and monitoring.
pub struct AutoSniper {
    executor: Arc<OrderExecutor>,
    sizer: PositionSizer,
    monitor: PositionMonitor,
    bus: EventBus,
    window: WindowConfig,
    min_confidence: f64,
    claimed: DashSet<String>,
    shutdown: CancellationToken,
}

impl AutoSniper {
    pub fn new(exchange: Arc<dyn TradingApi>, bus: EventBus, config: &AppConfig) -> Self {
        let retry = RetryExecutor::new(config.retry.clone(), config.execution.not_tradeable_code);
        let executor = OrderExecutor::new(Arc::clone(&exchange), retry, config.execution.min_order_value)
            .with_event_bus(bus.clone());

        Self {
            executor: Arc::new(executor),
            sizer: PositionSizer::new(
                Arc::clone(&exchange),
                config.sizing.clone(),
                &config.execution.quote_asset,
            ),
            monitor: PositionMonitor::new(exchange, config.monitor.clone()),
            bus,
            window: config.window.clone(),
            min_confidence: config.execution.min_confidence,
            claimed: DashSet::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn monitor(&self) -> &PositionMonitor {
        &self.monitor
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn should_execute_snipe(&self, confidence_score: f64) -> bool {
        confidence_score.is_finite() && confidence_score >= self.min_confidence
    }

    pub async fn snipe(&self, target: &SnipeTarget) -> SnipeOutcome {
        if !self.should_execute_snipe(target.confidence_score) {
            return self.skip(
                target,
                format!(
                    "confidence {:.2} below threshold {:.2}",
                    target.confidence_score, self.min_confidence
                ),
            );
        }

        // Claimed for good: a target never executes twice, even after a failure.
        if !self.claimed.insert(target.id.clone()) {
            return self.skip(target, "target already claimed".to_string());
        }

        info!(
            "🎯 [SNIPER] Target {} ({}) armed for launch at {}",
            target.id,
            target.symbol,
            target.launch_time.to_rfc3339()
        );

        let window = match wait_for_execution_window(target.launch_time, &self.window, &self.shutdown).await {
            Ok(window) => window,
            Err(e) => {
                info!("[SNIPER] Target {} not executed: {}", target.id, e);
                return SnipeOutcome::Cancelled {
                    target_id: target.id.clone(),
                };
            }
        };

        if !is_within_execution_window(window.end_time) {
            return self.skip(
                target,
                format!("execution window closed at {}", window.end_time.to_rfc3339()),
            );
        }

        let size = self.sizer.size_for(target, &SizingOptions::default()).await;
        let params = TradeParameters::market_buy_quote(&target.symbol, size).auto_snipe(target.confidence_score);
        let result = self.executor.execute_real_snipe(&params).await;

        if let Some(position) = result.position() {
            let handler = Arc::new(CloseOnExit {
                executor: Arc::clone(&self.executor),
                bus: self.bus.clone(),
            });
            self.monitor.start_monitoring(position.clone(), handler);
        } else if !result.success() {
            warn!(
                "❌ [SNIPER] Target {} ({}) failed: {}",
                target.id,
                target.symbol,
                result.error().unwrap_or("unknown error")
            );
        }

        SnipeOutcome::Executed(result)
    }

    /// Snipe every target concurrently and collect the outcomes.
    pub async fn run(self: &Arc<Self>, targets: Vec<SnipeTarget>) -> Vec<SnipeOutcome> {
        let mut set = JoinSet::new();
        for target in targets {
            let sniper = Arc::clone(self);
            set.spawn(async move { sniper.snipe(&target).await });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("❌ [SNIPER] Snipe task failed: {}", e),
            }
        }
        outcomes
    }

    /// Abort pending window waits and stop every monitor.
    pub fn emergency_stop(&self) {
        warn!("🚨 [SNIPER] Emergency stop requested");
        self.shutdown.cancel();
        self.monitor.stop();
    }

    fn skip(&self, target: &SnipeTarget, reason: String) -> SnipeOutcome {
        info!(
            event = events::SNIPE_SKIPPED,
            "[SNIPER] Skipping target {} ({}): {}",
            target.id,
            target.symbol,
            reason
        );
        SnipeOutcome::Skipped {
            target_id: target.id.clone(),
            reason,
        }
    }
}

/// Exit handler that market-sells the position and reports the close.
pub struct CloseOnExit {
    executor: Arc<OrderExecutor>,
    bus: EventBus,
}

impl CloseOnExit {
    pub fn new(executor: Arc<OrderExecutor>, bus: EventBus) -> Self {
        Self { executor, bus }
    }

    #[allow(clippy::too_many_arguments)]
    async fn close(
        &self,
        position_id: u64,
        symbol: &str,
        entry_price: f64,
        trigger_price: f64,
        profit_percent: f64,
        quantity: f64,
        reason: CloseReason,
    ) {
        match self.executor.execute_close_order(symbol, Side::Sell, quantity).await {
            Ok(ack) => {
                let exit_price = ack.price.filter(|p| *p > 0.0).unwrap_or(trigger_price);
                let closed = PositionClosed {
                    position_id,
                    symbol: symbol.to_string(),
                    entry_price,
                    exit_price,
                    quantity: ack.executed_qty.unwrap_or(quantity),
                    profit_percent,
                    reason,
                    close_order_id: Some(ack.order_id),
                    closed_at: Utc::now(),
                };
                info!(
                    event = events::POSITION_CLOSED,
                    "✅ [SNIPER] Closed position {} {} ({}) at {:.8}, pnl {:.4}",
                    position_id,
                    symbol,
                    reason.as_str(),
                    exit_price,
                    closed.realized_pnl()
                );
                self.bus.emit(Event::PositionClosed(closed));
            }
            Err(e) => {
                error!(
                    "❌ [SNIPER] Failed to close position {} {} ({}): {}",
                    position_id,
                    symbol,
                    reason.as_str(),
                    e
                );
            }
        }
    }
}

#[async_trait]
impl ExitHandler for CloseOnExit {
    async fn on_take_profit(&self, event: TakeProfitEvent) {
        self.close(
            event.position_id,
            &event.symbol,
            event.entry_price,
            event.current_price,
            event.profit_percent,
            event.quantity,
            CloseReason::TakeProfit,
        )
        .await;
    }

    async fn on_cancel(&self, event: CancelEvent) {
        self.close(
            event.position_id,
            &event.symbol,
            event.entry_price,
            event.current_price,
            event.profit_percent,
            event.quantity,
            event.reason,
        )
        .await;
    }
}
