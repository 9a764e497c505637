use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::order_executor::TradeResult;
use crate::services::position_monitor::Position;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
    Manual,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::TakeProfit => "take_profit",
            CloseReason::StopLoss => "stop_loss",
            CloseReason::Manual => "manual",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PositionClosed {
    pub position_id: u64,
    pub symbol: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub profit_percent: f64,
    pub reason: CloseReason,
    /// None when the close order could not be placed.
    pub close_order_id: Option<String>,
    pub closed_at: DateTime<Utc>,
}

impl PositionClosed {
    pub fn realized_pnl(&self) -> f64 {
        (self.exit_price - self.entry_price) * self.quantity
    }
}

// Global Event Enum
#[derive(Clone, Debug)]
pub enum Event {
    TradeExecuted(TradeResult),
    PositionOpened(Position),
    PositionClosed(PositionClosed),
}
