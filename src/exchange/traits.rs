use async_trait::async_trait;

use crate::error::ExchangeError;

use super::types::{AccountBalances, OrderAck, PlaceOrderRequest, SymbolInfo, Ticker};

pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Trading venue boundary. Implementations must be safe to call concurrently
/// from order execution and from every position monitor task.
#[async_trait]
pub trait TradingApi: Send + Sync {
    fn name(&self) -> &'static str;

    async fn place_order(&self, order: PlaceOrderRequest) -> ExchangeResult<OrderAck>;
    async fn get_ticker(&self, symbol: &str) -> ExchangeResult<Ticker>;
    async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<()>;
    async fn get_symbol_info(&self, symbol: &str) -> ExchangeResult<SymbolInfo>;
    async fn get_account_balances(&self) -> ExchangeResult<AccountBalances>;
}
