use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::SizingConfig;
use crate::exchange::traits::TradingApi;
use crate::exchange::types::AccountBalances;
use crate::services::sniper::SnipeTarget;

/// Balance figures the sizing math needs, in quote currency.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BalanceSummary {
    pub total_equity: f64,
    pub free_balance: f64,
}

impl BalanceSummary {
    pub fn from_balances(balances: &AccountBalances, quote_asset: &str) -> Self {
        Self {
            total_equity: balances.total_value,
            free_balance: balances.free(quote_asset),
        }
    }
}

/// Per-call overrides on top of `SizingConfig`.
#[derive(Clone, Debug, Default)]
pub struct SizingOptions {
    /// Tighter hard cap for this call; the smaller of this and the configured cap wins.
    pub max_position_usdt: Option<f64>,
}

/// Quote-currency notional for one snipe.
///
/// Takes the smallest of `equity * per_trade_fraction`,
/// `free * max_utilization_fraction` and any hard cap. Falls back to the
/// target's size hint (or the minimum floor) when balances are missing or the
/// result is unusable, then clamps to at least `min_position_usdt`.
pub fn compute_dynamic_position_size_usdt(
    balance: Option<&BalanceSummary>,
    config: &SizingConfig,
    target: &SnipeTarget,
    options: &SizingOptions,
) -> f64 {
    let hard_max = match (config.max_position_usdt, options.max_position_usdt) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };

    let fallback = || {
        target
            .position_size_hint
            .filter(|hint| hint.is_finite() && *hint > 0.0)
            .map(|hint| hard_max.map_or(hint, |max| hint.min(max)))
            .unwrap_or(config.min_position_usdt)
    };

    let size = match balance {
        Some(b) => {
            let by_equity = b.total_equity * config.per_trade_fraction;
            let by_free = b.free_balance * config.max_utilization_fraction;
            let mut size = by_equity.min(by_free);
            if let Some(max) = hard_max {
                size = size.min(max);
            }
            if size.is_finite() && size > 0.0 {
                size
            } else {
                fallback()
            }
        }
        None => fallback(),
    };

    size.max(config.min_position_usdt)
}

/// Fetches balances and applies `compute_dynamic_position_size_usdt`.
#[derive(Clone)]
pub struct PositionSizer {
    exchange: Arc<dyn TradingApi>,
    config: SizingConfig,
    quote_asset: String,
}

impl PositionSizer {
    pub fn new(exchange: Arc<dyn TradingApi>, config: SizingConfig, quote_asset: &str) -> Self {
        Self {
            exchange,
            config,
            quote_asset: quote_asset.to_string(),
        }
    }

    pub async fn size_for(&self, target: &SnipeTarget, options: &SizingOptions) -> f64 {
        let balance = match self.exchange.get_account_balances().await {
            Ok(balances) => Some(BalanceSummary::from_balances(&balances, &self.quote_asset)),
            Err(e) => {
                warn!(
                    "⚠️  [SIZING] Balance fetch failed for {}, using fallback size: {}",
                    target.symbol,
                    e.safe_message()
                );
                None
            }
        };

        let size = compute_dynamic_position_size_usdt(balance.as_ref(), &self.config, target, options);
        debug!("[SIZING] {} sized at {:.2} {}", target.symbol, size, self.quote_asset);
        size
    }
}
