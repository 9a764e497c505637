//! In-memory venue for dry runs and tests.
//!
//! Market orders fill immediately at the current price. Orders placed before a
//! market's listing time fail with the "symbol not yet tradeable" code, which
//! lets the retry path run end-to-end without a real exchange.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use serde_json::json;
use tracing::info;

use super::{
    traits::{ExchangeResult, TradingApi},
    types::{AccountBalances, Balance, OrderAck, PlaceOrderRequest, Side, SymbolFilter, SymbolInfo, Ticker},
};
use crate::config::PaperConfig;
use crate::constants::mexc::{INSUFFICIENT_BALANCE, INVALID_SYMBOL, SYMBOL_NOT_TRADEABLE};
use crate::error::ExchangeError;

#[derive(Clone, Debug)]
struct PaperMarket {
    price: f64,
    filters: Vec<SymbolFilter>,
    tradeable_from: Option<DateTime<Utc>>,
}

pub struct PaperExchange {
    quote_asset: String,
    markets: DashMap<String, PaperMarket>,
    balances: DashMap<String, f64>,
    orders: Mutex<Vec<PlaceOrderRequest>>,
    cancelled: Mutex<Vec<String>>,
    next_order_id: AtomicU64,
    place_attempts: AtomicU64,
    ticker_calls: DashMap<String, u64>,
    failing_tickers: DashSet<String>,
    fail_cancels: AtomicBool,
}

impl PaperExchange {
    pub fn new(quote_asset: &str) -> Self {
        Self {
            quote_asset: quote_asset.to_uppercase(),
            markets: DashMap::new(),
            balances: DashMap::new(),
            orders: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            next_order_id: AtomicU64::new(1),
            place_attempts: AtomicU64::new(0),
            ticker_calls: DashMap::new(),
            failing_tickers: DashSet::new(),
            fail_cancels: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &PaperConfig, quote_asset: &str) -> Self {
        let paper = Self::new(quote_asset);
        for (asset, amount) in &config.balances {
            paper.set_balance(asset, *amount);
        }
        for market in &config.markets {
            paper.list_symbol(
                &market.symbol,
                market.price,
                market.filters.clone().unwrap_or_else(default_filters),
            );
        }
        info!(
            "🧪 [PAPER] Simulated venue ready: {} markets, {} balances",
            config.markets.len(),
            config.balances.len()
        );
        paper
    }

    pub fn list_symbol(&self, symbol: &str, price: f64, filters: Vec<SymbolFilter>) {
        self.markets.insert(
            symbol.to_string(),
            PaperMarket {
                price,
                filters,
                tradeable_from: None,
            },
        );
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        if let Some(mut market) = self.markets.get_mut(symbol) {
            market.price = price;
        }
    }

    pub fn set_tradeable_from(&self, symbol: &str, at: DateTime<Utc>) {
        if let Some(mut market) = self.markets.get_mut(symbol) {
            market.tradeable_from = Some(at);
        }
    }

    pub fn set_balance(&self, asset: &str, free: f64) {
        self.balances.insert(asset.to_uppercase(), free);
    }

    pub fn balance(&self, asset: &str) -> f64 {
        self.balances
            .get(&asset.to_uppercase())
            .map(|b| *b)
            .unwrap_or(0.0)
    }

    /// Make ticker lookups for `symbol` fail until called again with `false`.
    pub fn fail_ticker(&self, symbol: &str, fail: bool) {
        if fail {
            self.failing_tickers.insert(symbol.to_string());
        } else {
            self.failing_tickers.remove(symbol);
        }
    }

    pub fn fail_cancels(&self, fail: bool) {
        self.fail_cancels.store(fail, Ordering::SeqCst);
    }

    pub fn ticker_calls(&self, symbol: &str) -> u64 {
        self.ticker_calls.get(symbol).map(|c| *c).unwrap_or(0)
    }

    pub fn place_attempts(&self) -> u64 {
        self.place_attempts.load(Ordering::SeqCst)
    }

    /// Orders that were accepted and filled.
    pub fn placed_orders(&self) -> Vec<PlaceOrderRequest> {
        self.orders.lock().map(|o| o.clone()).unwrap_or_default()
    }

    pub fn cancelled_orders(&self) -> Vec<String> {
        self.cancelled.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn base_asset<'a>(&self, symbol: &'a str) -> &'a str {
        symbol.strip_suffix(self.quote_asset.as_str()).unwrap_or(symbol)
    }

    fn debit(&self, asset: &str, amount: f64) -> ExchangeResult<()> {
        let mut entry = self.balances.entry(asset.to_uppercase()).or_insert(0.0);
        if *entry + 1e-12 < amount {
            return Err(ExchangeError::Api {
                code: INSUFFICIENT_BALANCE,
                message: format!("Insufficient balance for {}", asset),
            });
        }
        *entry = (*entry - amount).max(0.0);
        Ok(())
    }

    fn credit(&self, asset: &str, amount: f64) {
        *self.balances.entry(asset.to_uppercase()).or_insert(0.0) += amount;
    }
}

/// Permissive filters for markets declared without explicit constraints.
pub fn default_filters() -> Vec<SymbolFilter> {
    vec![
        SymbolFilter::LotSize {
            min_qty: 0.000001,
            max_qty: 1_000_000_000.0,
            step_size: 0.000001,
        },
        SymbolFilter::MinNotional { min_notional: 1.0 },
    ]
}

#[async_trait]
impl TradingApi for PaperExchange {
    fn name(&self) -> &'static str {
        "paper"
    }

    async fn place_order(&self, order: PlaceOrderRequest) -> ExchangeResult<OrderAck> {
        self.place_attempts.fetch_add(1, Ordering::SeqCst);

        let market = self
            .markets
            .get(&order.symbol)
            .map(|m| m.clone())
            .ok_or_else(|| ExchangeError::Api {
                code: INVALID_SYMBOL,
                message: "Invalid symbol.".to_string(),
            })?;

        if market.tradeable_from.is_some_and(|at| Utc::now() < at) {
            return Err(ExchangeError::Api {
                code: SYMBOL_NOT_TRADEABLE,
                message: "symbol not support api".to_string(),
            });
        }

        let fill_price = order.price.filter(|p| *p > 0.0).unwrap_or(market.price);
        let quantity = match (order.quantity, order.quote_order_qty) {
            (Some(q), _) => q,
            (None, Some(quote)) => quote / fill_price,
            (None, None) => return Err("order carries neither quantity nor quoteOrderQty".into()),
        };
        let notional = quantity * fill_price;
        let base = self.base_asset(&order.symbol).to_string();

        match order.side {
            Side::Buy => {
                self.debit(&self.quote_asset, notional)?;
                self.credit(&base, quantity);
            }
            Side::Sell => {
                self.debit(&base, quantity)?;
                self.credit(&self.quote_asset, notional);
            }
        }

        let order_id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut orders) = self.orders.lock() {
            orders.push(order.clone());
        }

        Ok(OrderAck {
            order_id: order_id.to_string(),
            symbol: order.symbol.clone(),
            status: "FILLED".to_string(),
            orig_qty: Some(quantity),
            executed_qty: Some(quantity),
            price: Some(fill_price),
            transact_time: Some(Utc::now().timestamp_millis()),
            raw: json!({
                "orderId": order_id,
                "symbol": order.symbol,
                "executedQty": quantity.to_string(),
                "cummulativeQuoteQty": notional.to_string(),
                "status": "FILLED",
            }),
        })
    }

    async fn get_ticker(&self, symbol: &str) -> ExchangeResult<Ticker> {
        *self.ticker_calls.entry(symbol.to_string()).or_insert(0) += 1;

        if self.failing_tickers.contains(symbol) {
            return Err(ExchangeError::Http {
                status: 503,
                body: "simulated outage".to_string(),
            });
        }

        self.markets
            .get(symbol)
            .map(|m| Ticker {
                symbol: symbol.to_string(),
                price: m.price,
            })
            .ok_or_else(|| ExchangeError::SymbolNotFound {
                symbol: symbol.to_string(),
            })
    }

    async fn cancel_order(&self, _symbol: &str, order_id: &str) -> ExchangeResult<()> {
        if self.fail_cancels.load(Ordering::SeqCst) {
            return Err(ExchangeError::Api {
                code: -2011,
                message: "Unknown order sent.".to_string(),
            });
        }
        if let Ok(mut cancelled) = self.cancelled.lock() {
            cancelled.push(order_id.to_string());
        }
        Ok(())
    }

    async fn get_symbol_info(&self, symbol: &str) -> ExchangeResult<SymbolInfo> {
        let market = self
            .markets
            .get(symbol)
            .map(|m| m.clone())
            .ok_or_else(|| ExchangeError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;

        let status = if market.tradeable_from.is_some_and(|at| Utc::now() < at) {
            "PENDING"
        } else {
            "TRADING"
        };

        Ok(SymbolInfo {
            symbol: symbol.to_string(),
            status: status.to_string(),
            filters: market.filters,
        })
    }

    async fn get_account_balances(&self) -> ExchangeResult<AccountBalances> {
        let balances: Vec<Balance> = self
            .balances
            .iter()
            .map(|e| Balance {
                asset: e.key().clone(),
                free: *e.value(),
                locked: 0.0,
            })
            .collect();

        let total_value = balances
            .iter()
            .map(|b| {
                if b.asset == self.quote_asset {
                    b.total()
                } else {
                    let pair = format!("{}{}", b.asset, self.quote_asset);
                    self.markets
                        .get(&pair)
                        .map(|m| m.price * b.total())
                        .unwrap_or(0.0)
                }
            })
            .sum();

        Ok(AccountBalances {
            balances,
            total_value,
        })
    }
}
