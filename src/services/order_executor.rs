//! Order execution against the venue: structural checks, live price, fresh
//! symbol filters, then submission through the retry executor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::bus::EventBus;
use crate::constants::events;
use crate::error::{ExchangeError, TradingError};
use crate::events::Event;
use crate::exchange::traits::TradingApi;
use crate::exchange::types::{OrderAck, OrderType, PlaceOrderRequest, Side, TimeInForce};
use crate::services::position_monitor::Position;
use crate::services::retry::RetryExecutor;
use crate::services::validator;

/// One execution request. Built once per attempt and never mutated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradeParameters {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub quote_order_qty: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub time_in_force: Option<TimeInForce>,
    #[serde(default)]
    pub is_auto_snipe: bool,
    #[serde(default)]
    pub confidence_score: Option<f64>,
}

impl TradeParameters {
    pub fn market_buy_quote(symbol: &str, quote_order_qty: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            side: Side::Buy,
            order_type: OrderType::Market,
            quantity: None,
            quote_order_qty: Some(quote_order_qty),
            price: None,
            time_in_force: None,
            is_auto_snipe: false,
            confidence_score: None,
        }
    }

    pub fn market_sell(symbol: &str, quantity: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            side: Side::Sell,
            order_type: OrderType::Market,
            quantity: Some(quantity),
            quote_order_qty: None,
            price: None,
            time_in_force: None,
            is_auto_snipe: false,
            confidence_score: None,
        }
    }

    pub fn auto_snipe(self, confidence_score: f64) -> Self {
        Self {
            is_auto_snipe: true,
            confidence_score: Some(confidence_score),
            ..self
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TradeData {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub requested_quantity: f64,
    pub executed_quantity: f64,
    pub price: f64,
    pub status: String,
    pub confidence_score: Option<f64>,
    pub position: Option<Position>,
}

/// Outcome of one execution attempt.
///
/// Fields are private so a successful result always carries order data with a
/// non-empty order id, and a failed one only an error message.
#[derive(Clone, Debug, Serialize)]
pub struct TradeResult {
    success: bool,
    symbol: String,
    data: Option<TradeData>,
    error: Option<String>,
    execution_time_ms: u64,
    timestamp: DateTime<Utc>,
}

impl TradeResult {
    fn filled(data: TradeData, execution_time_ms: u64) -> Self {
        Self {
            success: true,
            symbol: data.symbol.clone(),
            data: Some(data),
            error: None,
            execution_time_ms,
            timestamp: Utc::now(),
        }
    }

    fn failed(symbol: &str, error: String, execution_time_ms: u64) -> Self {
        Self {
            success: false,
            symbol: symbol.to_string(),
            data: None,
            error: Some(error),
            execution_time_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn data(&self) -> Option<&TradeData> {
        self.data.as_ref()
    }

    pub fn order_id(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.order_id.as_str())
    }

    pub fn position(&self) -> Option<&Position> {
        self.data.as_ref().and_then(|d| d.position.as_ref())
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn execution_time_ms(&self) -> u64 {
        self.execution_time_ms
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

pub struct OrderExecutor {
    exchange: Arc<dyn TradingApi>,
    retry: RetryExecutor,
    min_order_value: f64,
    bus: Option<EventBus>,
    next_position_id: AtomicU64,
}

impl OrderExecutor {
    pub fn new(exchange: Arc<dyn TradingApi>, retry: RetryExecutor, min_order_value: f64) -> Self {
        Self {
            exchange,
            retry,
            min_order_value,
            bus: None,
            next_position_id: AtomicU64::new(1),
        }
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Checks that need no market data.
    pub fn validate_params(&self, params: &TradeParameters) -> Result<(), TradingError> {
        if params.symbol.trim().is_empty() {
            return Err(TradingError::Validation("Symbol is required".into()));
        }

        let positive = |v: f64| v.is_finite() && v > 0.0;
        if let Some(q) = params.quantity {
            if !positive(q) {
                return Err(TradingError::Validation(format!("Invalid quantity: {}", q)));
            }
        }
        if let Some(q) = params.quote_order_qty {
            if !positive(q) {
                return Err(TradingError::Validation(format!("Invalid quoteOrderQty: {}", q)));
            }
            if q < self.min_order_value {
                return Err(TradingError::Validation(format!(
                    "Order value {} is below minimum {}",
                    q, self.min_order_value
                )));
            }
        }
        if params.quantity.is_none() && params.quote_order_qty.is_none() {
            return Err(TradingError::Validation(
                "Either quantity or quoteOrderQty is required".into(),
            ));
        }

        if params.order_type.requires_price() && !params.price.is_some_and(positive) {
            return Err(TradingError::Validation(format!(
                "{} orders require a positive price",
                params.order_type.as_str()
            )));
        }
        Ok(())
    }

    /// Place a live order. Expected failures come back as a failed `TradeResult`.
    pub async fn execute_real_snipe(&self, params: &TradeParameters) -> TradeResult {
        let started = Instant::now();

        let result = match self.try_execute(params).await {
            Ok(data) => {
                info!(
                    event = events::ORDER_FILLED,
                    "✅ [EXECUTOR] {} {} {} filled: order {} qty={} price={:.8} in {}ms",
                    params.side.as_str(),
                    params.order_type.as_str(),
                    data.symbol,
                    data.order_id,
                    data.executed_quantity,
                    data.price,
                    started.elapsed().as_millis()
                );
                TradeResult::filled(data, started.elapsed().as_millis() as u64)
            }
            Err(e) => {
                error!(
                    event = events::ORDER_FAILED,
                    symbol = %params.symbol,
                    side = params.side.as_str(),
                    order_type = params.order_type.as_str(),
                    quote_order_qty = ?params.quote_order_qty,
                    "❌ [EXECUTOR] Execution failed: {}",
                    e
                );
                TradeResult::failed(&params.symbol, e.safe_message(), started.elapsed().as_millis() as u64)
            }
        };

        if let Some(position) = result.position() {
            info!(
                event = events::POSITION_OPENED,
                "[EXECUTOR] Position {} opened: {} qty={} entry={:.8}",
                position.id,
                position.symbol,
                position.quantity,
                position.entry_price
            );
        }
        if let Some(bus) = &self.bus {
            if let Some(position) = result.position() {
                bus.emit(Event::PositionOpened(position.clone()));
            }
            bus.emit(Event::TradeExecuted(result.clone()));
        }
        result
    }

    async fn try_execute(&self, params: &TradeParameters) -> Result<TradeData, TradingError> {
        self.validate_params(params)?;

        let current_price = self.current_price(&params.symbol).await?;
        // Limit-style orders are sized and checked at their own price.
        let reference_price = match params.order_type {
            OrderType::Market => current_price,
            _ => params.price.unwrap_or(current_price),
        };

        let quantity = match (params.side, params.quantity, params.quote_order_qty) {
            (_, Some(q), _) => q,
            (Side::Buy, None, Some(quote)) => quote / reference_price,
            (Side::Sell, None, _) => {
                return Err(TradingError::Validation("SELL orders require a quantity".into()));
            }
            (Side::Buy, None, None) => {
                return Err(TradingError::Validation(
                    "Either quantity or quoteOrderQty is required".into(),
                ));
            }
        };

        let order_value = quantity * reference_price;
        if order_value < self.min_order_value {
            return Err(TradingError::Validation(format!(
                "Order value {:.4} is below minimum {}",
                order_value, self.min_order_value
            )));
        }

        let info = self
            .exchange
            .get_symbol_info(&params.symbol)
            .await
            .map_err(|e| {
                warn!("⚠️  [EXECUTOR] Symbol info lookup for {} failed: {}", params.symbol, e);
                TradingError::SymbolInfoUnavailable {
                    symbol: params.symbol.clone(),
                }
            })?;

        let check = validator::validate(quantity, reference_price, &info.filters);
        for w in &check.warnings {
            warn!("[EXECUTOR] {}: {}", params.symbol, w);
        }
        if !check.is_valid {
            return Err(TradingError::Validation(check.errors.join("; ")));
        }

        let request = PlaceOrderRequest {
            symbol: params.symbol.clone(),
            side: params.side,
            order_type: params.order_type,
            quantity: Some(check.adjusted_quantity),
            quote_order_qty: None,
            price: params.order_type.requires_price().then_some(check.adjusted_price),
            time_in_force: params
                .time_in_force
                .or_else(|| params.order_type.requires_price().then_some(TimeInForce::Gtc)),
            // Shared by every retry so the venue can dedupe a resubmission.
            client_order_id: Some(format!("snipe{}", Uuid::new_v4().simple())),
        };

        info!(
            "[EXECUTOR] Submitting {} {} {} qty={} (ref price {:.8})",
            request.side.as_str(),
            request.order_type.as_str(),
            request.symbol,
            check.adjusted_quantity,
            reference_price
        );

        let ack = self.submit(&request).await?;
        if ack.order_id.trim().is_empty() {
            return Err(TradingError::Exchange(ExchangeError::Other(
                "Exchange accepted the order without an order id".into(),
            )));
        }

        let executed_quantity = ack.executed_qty.unwrap_or(check.adjusted_quantity);
        let fill_price = ack.price.filter(|p| *p > 0.0).unwrap_or(reference_price);

        let position = (params.side == Side::Buy && executed_quantity > 0.0).then(|| {
            let still_working = !ack.status.eq_ignore_ascii_case("FILLED");
            Position::open(
                self.next_position_id.fetch_add(1, Ordering::SeqCst),
                &params.symbol,
                fill_price,
                executed_quantity,
                still_working.then(|| ack.order_id.clone()),
            )
        });

        Ok(TradeData {
            order_id: ack.order_id,
            symbol: params.symbol.clone(),
            side: params.side,
            order_type: params.order_type,
            requested_quantity: quantity,
            executed_quantity,
            price: fill_price,
            status: ack.status,
            confidence_score: params.confidence_score,
            position,
        })
    }

    /// Market order that closes (part of) a position.
    pub async fn execute_close_order(&self, symbol: &str, side: Side, quantity: f64) -> Result<OrderAck, TradingError> {
        if symbol.trim().is_empty() {
            return Err(TradingError::Validation("Symbol is required".into()));
        }
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(TradingError::Validation(format!("Invalid close quantity: {}", quantity)));
        }

        // Round down to the lot step so we never try to sell more than was bought.
        // No notional check here: a close must go out whatever the price.
        let quantity = match self.exchange.get_symbol_info(symbol).await {
            Ok(info) => {
                let check = validator::validate_quantity(quantity, &info.filters);
                if !check.is_valid {
                    warn!(
                        symbol = %symbol,
                        quantity,
                        adjusted = check.adjusted_quantity,
                        "⚠️  [EXECUTOR] Close quantity fails LOT_SIZE: {}",
                        check.errors.join("; ")
                    );
                }
                if check.adjusted_quantity > 0.0 && check.details.step_size.is_some() {
                    check.adjusted_quantity
                } else {
                    quantity
                }
            }
            Err(e) => {
                warn!("⚠️  [EXECUTOR] No filters for {} close, sending raw quantity: {}", symbol, e);
                quantity
            }
        };

        let request = PlaceOrderRequest {
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            quantity: Some(quantity),
            quote_order_qty: None,
            price: None,
            time_in_force: None,
            client_order_id: Some(format!("close{}", Uuid::new_v4().simple())),
        };

        info!("[EXECUTOR] Closing {} {} qty={}", side.as_str(), symbol, quantity);
        self.submit(&request).await.map_err(|e| {
            error!(
                symbol = %symbol,
                side = side.as_str(),
                quantity,
                "❌ [EXECUTOR] Close order failed: {}",
                e
            );
            e
        })
    }

    async fn submit(&self, request: &PlaceOrderRequest) -> Result<OrderAck, TradingError> {
        let exchange = Arc::clone(&self.exchange);
        self.retry
            .execute_order_with_retry(|| {
                let exchange = Arc::clone(&exchange);
                let request = request.clone();
                async move { exchange.place_order(request).await }
            })
            .await
    }

    async fn current_price(&self, symbol: &str) -> Result<f64, TradingError> {
        match self.exchange.get_ticker(symbol).await {
            Ok(t) if t.price.is_finite() && t.price > 0.0 => Ok(t.price),
            Ok(t) => {
                warn!("[EXECUTOR] Ticker for {} returned unusable price {}", symbol, t.price);
                Err(TradingError::PriceUnavailable {
                    symbol: symbol.to_string(),
                })
            }
            Err(e) => {
                warn!("⚠️  [EXECUTOR] Ticker lookup for {} failed: {}", symbol, e);
                Err(TradingError::PriceUnavailable {
                    symbol: symbol.to_string(),
                })
            }
        }
    }
}
