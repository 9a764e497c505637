use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::constants::{events, position_monitor::PCT_EPSILON};
use crate::events::CloseReason;
use crate::exchange::traits::TradingApi;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
    Cancelled,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Position {
    pub id: u64,
    pub symbol: String,
    pub entry_price: f64,
    pub quantity: f64,
    pub status: PositionStatus,
    /// Exchange order still working for this position, cancelled on exit.
    pub order_id: Option<String>,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn open(id: u64, symbol: &str, entry_price: f64, quantity: f64, order_id: Option<String>) -> Self {
        Self {
            id,
            symbol: symbol.to_string(),
            entry_price,
            quantity,
            status: PositionStatus::Open,
            order_id,
            opened_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TakeProfitEvent {
    pub position_id: u64,
    pub symbol: String,
    pub entry_price: f64,
    pub current_price: f64,
    pub profit_percent: f64,
    pub quantity: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CancelEvent {
    pub position_id: u64,
    pub symbol: String,
    pub entry_price: f64,
    pub current_price: f64,
    pub profit_percent: f64,
    pub quantity: f64,
    pub reason: CloseReason,
}

/// Receives exit triggers. Called at most once per monitored position.
#[async_trait]
pub trait ExitHandler: Send + Sync {
    async fn on_take_profit(&self, event: TakeProfitEvent);
    async fn on_cancel(&self, event: CancelEvent);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitDecision {
    Hold,
    TakeProfit,
    StopLoss,
}

pub fn profit_percent(entry_price: f64, current_price: f64) -> f64 {
    (current_price - entry_price) / entry_price * 100.0
}

pub fn evaluate_exit(profit_percent: f64, config: &MonitorConfig) -> ExitDecision {
    // Epsilon keeps exact thresholds (55000 vs 50000 at 10%) from missing on float noise.
    if profit_percent + PCT_EPSILON >= config.take_profit_percent {
        ExitDecision::TakeProfit
    } else if profit_percent - PCT_EPSILON <= -config.stop_loss_percent {
        ExitDecision::StopLoss
    } else {
        ExitDecision::Hold
    }
}

struct MonitorHandle {
    symbol: String,
    generation: u64,
    cancel: CancellationToken,
    started_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MonitoredPosition {
    pub position_id: u64,
    pub symbol: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MonitorStatus {
    pub active_count: usize,
    pub positions: Vec<MonitoredPosition>,
    pub check_interval_ms: u64,
    pub take_profit_percent: f64,
    pub stop_loss_percent: f64,
}

/// Polls prices for open positions and fires take-profit / stop-loss exits.
///
/// Each position gets its own tokio task. The map of active positions is only
/// touched by `start_monitoring`/`stop_monitoring`/`stop`, plus a task
/// removing its own entry after it fires.
#[derive(Clone)]
pub struct PositionMonitor {
    exchange: Arc<dyn TradingApi>,
    config: Arc<MonitorConfig>,
    active: Arc<DashMap<u64, MonitorHandle>>,
    generation: Arc<AtomicU64>,
}

impl PositionMonitor {
    pub fn new(exchange: Arc<dyn TradingApi>, config: MonitorConfig) -> Self {
        Self {
            exchange,
            config: Arc::new(config),
            active: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns false (and starts nothing) when the position is already monitored.
    pub fn start_monitoring(&self, position: Position, handler: Arc<dyn ExitHandler>) -> bool {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();

        match self.active.entry(position.id) {
            Entry::Occupied(_) => {
                warn!(
                    "⚠️  [MONITOR] Position {} ({}) is already monitored, ignoring duplicate start",
                    position.id, position.symbol
                );
                return false;
            }
            Entry::Vacant(slot) => {
                slot.insert(MonitorHandle {
                    symbol: position.symbol.clone(),
                    generation,
                    cancel: cancel.clone(),
                    started_at: Utc::now(),
                });
            }
        }

        info!(
            "👁️  [MONITOR] Watching position {} {} qty={} entry={:.8} (TP +{}%, SL -{}%, every {}ms)",
            position.id,
            position.symbol,
            position.quantity,
            position.entry_price,
            self.config.take_profit_percent,
            self.config.stop_loss_percent,
            self.config.check_interval_ms
        );

        let task = MonitorTask {
            exchange: Arc::clone(&self.exchange),
            config: Arc::clone(&self.config),
            active: Arc::clone(&self.active),
            position,
            handler,
            cancel,
            generation,
        };
        tokio::spawn(task.run());
        true
    }

    pub fn stop_monitoring(&self, position_id: u64) -> bool {
        match self.active.remove(&position_id) {
            Some((_, handle)) => {
                handle.cancel.cancel();
                info!("[MONITOR] Stopped monitoring position {} ({})", position_id, handle.symbol);
                true
            }
            None => false,
        }
    }

    /// Cancel every timer and empty the tracked set.
    pub fn stop(&self) {
        let ids: Vec<u64> = self.active.iter().map(|e| *e.key()).collect();
        for id in &ids {
            self.stop_monitoring(*id);
        }
        info!("🛑 [MONITOR] Stopped all monitoring ({} positions)", ids.len());
    }

    pub fn is_monitoring(&self, position_id: u64) -> bool {
        self.active.contains_key(&position_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn get_status(&self) -> MonitorStatus {
        let mut positions: Vec<MonitoredPosition> = self
            .active
            .iter()
            .map(|e| MonitoredPosition {
                position_id: *e.key(),
                symbol: e.symbol.clone(),
                started_at: e.started_at,
            })
            .collect();
        positions.sort_by_key(|p| p.position_id);

        MonitorStatus {
            active_count: positions.len(),
            positions,
            check_interval_ms: self.config.check_interval_ms,
            take_profit_percent: self.config.take_profit_percent,
            stop_loss_percent: self.config.stop_loss_percent,
        }
    }
}

struct MonitorTask {
    exchange: Arc<dyn TradingApi>,
    config: Arc<MonitorConfig>,
    active: Arc<DashMap<u64, MonitorHandle>>,
    position: Position,
    handler: Arc<dyn ExitHandler>,
    cancel: CancellationToken,
    generation: u64,
}

impl MonitorTask {
    async fn run(self) {
        let period = Duration::from_millis(self.config.check_interval_ms.max(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if self.check().await {
                        break;
                    }
                }
            }
        }
        debug!("[MONITOR] Task for position {} exited", self.position.id);
    }

    /// One price check. Returns true once the position has left monitoring.
    async fn check(&self) -> bool {
        let symbol = &self.position.symbol;
        let current_price = match self.exchange.get_ticker(symbol).await {
            Ok(t) if t.price.is_finite() && t.price > 0.0 => t.price,
            Ok(t) => {
                warn!("[MONITOR] Ignoring invalid price {} for {}", t.price, symbol);
                return false;
            }
            Err(e) => {
                warn!(
                    "⚠️  [MONITOR] Price check failed for {} (position {}), will retry: {}",
                    symbol,
                    self.position.id,
                    e.safe_message()
                );
                return false;
            }
        };

        // stop() may have landed while the ticker call was in flight.
        if self.cancel.is_cancelled() {
            return true;
        }

        let pct = profit_percent(self.position.entry_price, current_price);
        match evaluate_exit(pct, &self.config) {
            ExitDecision::Hold => {
                debug!(
                    "[MONITOR] {} position {}: entry={:.8} current={:.8} pl={:.2}%",
                    symbol, self.position.id, self.position.entry_price, current_price, pct
                );
                false
            }
            ExitDecision::TakeProfit => {
                info!(
                    event = events::TAKE_PROFIT_TRIGGERED,
                    "💰 [MONITOR] TAKE PROFIT for {} position {}: entry={:.8} current={:.8} (+{:.2}%)",
                    symbol, self.position.id, self.position.entry_price, current_price, pct
                );
                self.release();
                self.cancel_open_order().await;
                self.handler
                    .on_take_profit(TakeProfitEvent {
                        position_id: self.position.id,
                        symbol: symbol.clone(),
                        entry_price: self.position.entry_price,
                        current_price,
                        profit_percent: pct,
                        quantity: self.position.quantity,
                    })
                    .await;
                true
            }
            ExitDecision::StopLoss => {
                warn!(
                    event = events::STOP_LOSS_TRIGGERED,
                    "🛑 [MONITOR] STOP LOSS for {} position {}: entry={:.8} current={:.8} ({:.2}%)",
                    symbol, self.position.id, self.position.entry_price, current_price, pct
                );
                self.release();
                self.cancel_open_order().await;
                self.handler
                    .on_cancel(CancelEvent {
                        position_id: self.position.id,
                        symbol: symbol.clone(),
                        entry_price: self.position.entry_price,
                        current_price,
                        profit_percent: pct,
                        quantity: self.position.quantity,
                        reason: CloseReason::StopLoss,
                    })
                    .await;
                true
            }
        }
    }

    /// Drop our own map entry. A newer monitor for the same id is left alone.
    fn release(&self) {
        self.active
            .remove_if(&self.position.id, |_, h| h.generation == self.generation);
        self.cancel.cancel();
    }

    async fn cancel_open_order(&self) {
        let Some(order_id) = &self.position.order_id else {
            return;
        };
        if let Err(e) = self.exchange.cancel_order(&self.position.symbol, order_id).await {
            warn!(
                "⚠️  [MONITOR] Cancel of order {} for {} failed, continuing with exit: {}",
                order_id,
                self.position.symbol,
                e.safe_message()
            );
        }
    }
}
