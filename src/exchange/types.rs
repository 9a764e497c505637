use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    StopLimit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::StopLimit => "STOP_LIMIT",
        }
    }

    pub fn requires_price(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Gtc,
    Ioc, // Immediate Or Cancel
    Fok, // Fill Or Kill
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::Fok => "FOK",
        }
    }
}

/// Wire-level order request handed to a `TradingApi`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    /// Quantity in base units. If quote_order_qty is set, quantity may be None.
    pub quantity: Option<f64>,
    /// Amount in quote currency (market orders only).
    pub quote_order_qty: Option<f64>,
    pub price: Option<f64>,
    pub time_in_force: Option<TimeInForce>,
    /// Idempotency key forwarded as `newClientOrderId`.
    pub client_order_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderAck {
    /// Always stringified, whatever the venue's native id type.
    pub order_id: String,
    pub symbol: String,
    pub status: String,
    pub orig_qty: Option<f64>,
    pub executed_qty: Option<f64>,
    /// Average fill price when known, otherwise the order price.
    pub price: Option<f64>,
    pub transact_time: Option<i64>,
    pub raw: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub price: f64,
}

/// Exchange-supplied constraint set for one symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filterType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolFilter {
    #[serde(rename_all = "camelCase")]
    LotSize {
        min_qty: f64,
        max_qty: f64,
        step_size: f64,
    },
    #[serde(rename_all = "camelCase")]
    PriceFilter {
        min_price: f64,
        max_price: f64,
        tick_size: f64,
    },
    #[serde(rename_all = "camelCase")]
    MinNotional { min_notional: f64 },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    pub filters: Vec<SymbolFilter>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub free: f64,
    pub locked: f64,
}

impl Balance {
    pub fn total(&self) -> f64 {
        self.free + self.locked
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountBalances {
    pub balances: Vec<Balance>,
    /// Account value expressed in the quote asset.
    pub total_value: f64,
}

impl AccountBalances {
    pub fn free(&self, asset: &str) -> f64 {
        self.balances
            .iter()
            .find(|b| b.asset.eq_ignore_ascii_case(asset))
            .map(|b| b.free)
            .unwrap_or(0.0)
    }
}
