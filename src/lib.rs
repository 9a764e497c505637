//! MEXC sniper - execution and monitoring core for new-listing snipes
//!
//! This library provides launch-window timing, exchange-compliant order
//! execution with retry, position sizing, and take-profit/stop-loss
//! monitoring of the resulting positions.

pub mod bus;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod exchange;
pub mod services;

// Re-export commonly used types
pub use bus::EventBus;
pub use config::AppConfig;
pub use error::{ExchangeError, TradingError};
pub use events::{CloseReason, Event, PositionClosed};
pub use exchange::traits::TradingApi;
pub use services::order_executor::{OrderExecutor, TradeParameters, TradeResult};
pub use services::position_monitor::{Position, PositionMonitor};
pub use services::sniper::{AutoSniper, SnipeOutcome, SnipeTarget};
