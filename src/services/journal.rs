use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::{
    bus::EventBus,
    events::{CloseReason, Event, PositionClosed},
    services::{order_executor::TradeResult, position_monitor::Position},
};

type JournalResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JournalEntry {
    pub ts: String,

    /// "trade" | "position_opened" | "position_closed"
    pub kind: String,

    pub symbol: String,

    /// Exchange order id if known
    pub order_id: Option<String>,

    pub position_id: Option<u64>,

    pub success: Option<bool>,
    pub qty: Option<f64>,
    pub price: Option<f64>,

    /// Estimated notional = qty * price when both are present
    pub notional: Option<f64>,

    pub pnl: Option<f64>,

    /// Error message or close reason
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub position_id: u64,
    pub symbol: String,
    pub opened_at: Option<String>,
    pub closed_at: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub qty: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub reason: CloseReason,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,

    pub positions_opened: u64,
    pub positions_closed: u64,

    pub take_profits: u64,
    pub stop_losses: u64,

    pub winning_trades: u64,
    pub losing_trades: u64,

    pub total_notional: f64,
    pub realized_pnl: f64,

    /// Currently open positions by id
    pub open_positions: HashMap<u64, Position>,

    /// Closed trades grouped by symbol
    pub history: HashMap<String, Vec<ClosedTrade>>,
}

impl PerformanceSummary {
    pub fn win_rate(&self) -> Option<f64> {
        let closed = self.winning_trades + self.losing_trades;
        (closed > 0).then(|| self.winning_trades as f64 / closed as f64 * 100.0)
    }
}

/// Persists engine events as JSONL plus a rolling `trade_summary.json`.
#[derive(Clone)]
pub struct TradeJournal {
    summary: Arc<Mutex<PerformanceSummary>>,
    log_path: PathBuf,
}

impl TradeJournal {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            summary: Arc::new(Mutex::new(PerformanceSummary::default())),
            log_path: log_path.into(),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn summary_path(&self) -> PathBuf {
        self.log_path.with_file_name("trade_summary.json")
    }

    pub fn summary(&self) -> PerformanceSummary {
        self.summary
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn start(&self, event_bus: &EventBus) -> tokio::task::JoinHandle<()> {
        let mut rx = event_bus.subscribe();
        let journal = self.clone();

        tokio::spawn(async move {
            info!("📊 [JOURNAL] Started (log: {})", journal.log_path.display());

            loop {
                match rx.recv().await {
                    Ok(event) => journal.record(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("⚠️  [JOURNAL] Lagged behind the event bus, {} events dropped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            info!("[JOURNAL] Event bus closed, journal stopped");
        })
    }

    /// Apply one event to the summary and persist it.
    pub fn record(&self, event: &Event) {
        let entry = match event {
            Event::TradeExecuted(result) => self.on_trade(result),
            Event::PositionOpened(position) => self.on_position_opened(position),
            Event::PositionClosed(closed) => self.on_position_closed(closed),
        };

        if let Err(e) = self.append_jsonl(&entry) {
            error!("❌ [JOURNAL] Failed to append {}: {}", self.log_path.display(), e);
        }
        if let Err(e) = self.flush_summary() {
            error!("❌ [JOURNAL] Failed to flush summary: {}", e);
        }
    }

    fn with_summary<R>(&self, f: impl FnOnce(&mut PerformanceSummary) -> R) -> R {
        let mut guard = self.summary.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    fn on_trade(&self, result: &TradeResult) -> JournalEntry {
        let data = result.data();
        self.with_summary(|s| {
            s.total_executions += 1;
            match data {
                Some(d) => {
                    s.successful_executions += 1;
                    s.total_notional += d.executed_quantity * d.price;
                }
                None => s.failed_executions += 1,
            }
        });

        JournalEntry {
            ts: result.timestamp().to_rfc3339(),
            kind: "trade".to_string(),
            symbol: result.symbol().to_string(),
            order_id: result.order_id().map(str::to_string),
            position_id: result.position().map(|p| p.id),
            success: Some(result.success()),
            qty: data.map(|d| d.executed_quantity),
            price: data.map(|d| d.price),
            notional: data.map(|d| d.executed_quantity * d.price),
            pnl: None,
            notes: result.error().map(str::to_string),
        }
    }

    fn on_position_opened(&self, position: &Position) -> JournalEntry {
        self.with_summary(|s| {
            s.positions_opened += 1;
            s.open_positions.insert(position.id, position.clone());
        });

        JournalEntry {
            ts: position.opened_at.to_rfc3339(),
            kind: "position_opened".to_string(),
            symbol: position.symbol.clone(),
            order_id: position.order_id.clone(),
            position_id: Some(position.id),
            success: None,
            qty: Some(position.quantity),
            price: Some(position.entry_price),
            notional: Some(position.quantity * position.entry_price),
            pnl: None,
            notes: None,
        }
    }

    fn on_position_closed(&self, closed: &PositionClosed) -> JournalEntry {
        let pnl = closed.realized_pnl();
        self.with_summary(|s| {
            s.positions_closed += 1;
            s.realized_pnl += pnl;
            match closed.reason {
                CloseReason::TakeProfit => s.take_profits += 1,
                CloseReason::StopLoss => s.stop_losses += 1,
                CloseReason::Manual => {}
            }
            if pnl >= 0.0 {
                s.winning_trades += 1;
            } else {
                s.losing_trades += 1;
            }

            let opened = s.open_positions.remove(&closed.position_id);
            let pnl_percent = if closed.entry_price > 0.0 {
                (closed.exit_price - closed.entry_price) / closed.entry_price * 100.0
            } else {
                closed.profit_percent
            };
            s.history
                .entry(closed.symbol.clone())
                .or_default()
                .push(ClosedTrade {
                    position_id: closed.position_id,
                    symbol: closed.symbol.clone(),
                    opened_at: opened.map(|p| p.opened_at.to_rfc3339()),
                    closed_at: closed.closed_at.to_rfc3339(),
                    entry_price: closed.entry_price,
                    exit_price: closed.exit_price,
                    qty: closed.quantity,
                    pnl,
                    pnl_percent,
                    reason: closed.reason,
                });
        });

        JournalEntry {
            ts: Utc::now().to_rfc3339(),
            kind: "position_closed".to_string(),
            symbol: closed.symbol.clone(),
            order_id: closed.close_order_id.clone(),
            position_id: Some(closed.position_id),
            success: None,
            qty: Some(closed.quantity),
            price: Some(closed.exit_price),
            notional: Some(closed.quantity * closed.exit_price),
            pnl: Some(pnl),
            notes: Some(closed.reason.as_str().to_string()),
        }
    }

    fn append_jsonl(&self, entry: &JournalEntry) -> JournalResult<()> {
        use std::io::Write;

        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        let line = serde_json::to_string(entry)?;
        writeln!(f, "{}", line)?;
        Ok(())
    }

    fn flush_summary(&self) -> JournalResult<()> {
        let summary_path = self.summary_path();

        if let Some(parent) = summary_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let s = self.summary();
        std::fs::write(summary_path, serde_json::to_vec_pretty(&s)?)?;
        Ok(())
    }
}
