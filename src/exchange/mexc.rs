//! MEXC Spot v3 adapter (signed REST).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    auth::{build_query, build_signed_query},
    traits::{ExchangeResult, TradingApi},
    types::{AccountBalances, Balance, OrderAck, PlaceOrderRequest, SymbolFilter, SymbolInfo, Ticker},
};

use crate::config::MexcConfig;
use crate::constants::mexc::API_KEY_HEADER;
use crate::error::ExchangeError;

#[derive(Clone)]
pub struct MexcExchange {
    client: Client,
    base_url: String,
    api_key: String,
    secret_key: String,
    recv_window_ms: u64,
    quote_asset: String,
}

impl MexcExchange {
    pub fn new(config: MexcConfig, quote_asset: &str) -> ExchangeResult<Self> {
        if config.api_key.is_empty() || config.secret_key.is_empty() {
            return Err(ExchangeError::AuthFailed {
                reason: "MEXC api_key/secret_key not configured".to_string(),
            });
        }

        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            secret_key: config.secret_key,
            recv_window_ms: config.recv_window_ms,
            quote_asset: quote_asset.to_uppercase(),
        })
    }

    fn signed_url(&self, path: &str, mut params: Vec<(&str, String)>) -> String {
        params.push(("recvWindow", self.recv_window_ms.to_string()));
        params.push(("timestamp", chrono::Utc::now().timestamp_millis().to_string()));
        format!(
            "{}{}?{}",
            self.base_url,
            path,
            build_signed_query(&params, &self.secret_key)
        )
    }

    fn public_url(&self, path: &str, params: &[(&str, String)]) -> String {
        format!("{}{}?{}", self.base_url, path, build_query(params))
    }

    async fn send(&self, req: RequestBuilder) -> ExchangeResult<Value> {
        let resp = req.header(API_KEY_HEADER, &self.api_key).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(parse_error(status, &text));
        }

        let body: Value = serde_json::from_str(&text)?;

        // Some endpoints answer 200 with an error envelope.
        if let Some(code) = body.get("code").and_then(Value::as_i64) {
            if code != 0 && code != 200 && body.get("msg").is_some() {
                return Err(ExchangeError::Api {
                    code,
                    message: body["msg"].as_str().unwrap_or_default().to_string(),
                });
            }
        }

        Ok(body)
    }
}

#[async_trait]
impl TradingApi for MexcExchange {
    fn name(&self) -> &'static str {
        "mexc"
    }

    async fn place_order(&self, order: PlaceOrderRequest) -> ExchangeResult<OrderAck> {
        let mut params: Vec<(&str, String)> = vec![
            ("symbol", order.symbol.clone()),
            ("side", order.side.as_str().to_string()),
            ("type", order.order_type.as_str().to_string()),
        ];
        if let Some(qty) = order.quantity {
            params.push(("quantity", qty.to_string()));
        }
        if let Some(quote) = order.quote_order_qty {
            params.push(("quoteOrderQty", quote.to_string()));
        }
        if let Some(price) = order.price {
            params.push(("price", price.to_string()));
        }
        if let Some(tif) = order.time_in_force {
            params.push(("timeInForce", tif.as_str().to_string()));
        }
        if let Some(id) = &order.client_order_id {
            params.push(("newClientOrderId", id.clone()));
        }

        let url = self.signed_url("/api/v3/order", params);
        let raw = self.send(self.client.post(&url)).await?;
        debug!("[MEXC] place_order {} raw={}", order.symbol, raw);

        parse_order_ack(raw, &order.symbol)
    }

    async fn get_ticker(&self, symbol: &str) -> ExchangeResult<Ticker> {
        let url = self.public_url("/api/v3/ticker/price", &[("symbol", symbol.to_string())]);
        let raw = self.send(self.client.get(&url)).await?;

        let price = number(&raw, "price").filter(|p| *p > 0.0).ok_or_else(|| {
            ExchangeError::Other(format!("ticker for {} has no usable price", symbol))
        })?;

        Ok(Ticker {
            symbol: symbol.to_string(),
            price,
        })
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<()> {
        let url = self.signed_url(
            "/api/v3/order",
            vec![("symbol", symbol.to_string()), ("orderId", order_id.to_string())],
        );
        self.send(self.client.delete(&url)).await?;
        Ok(())
    }

    async fn get_symbol_info(&self, symbol: &str) -> ExchangeResult<SymbolInfo> {
        let url = self.public_url("/api/v3/exchangeInfo", &[("symbol", symbol.to_string())]);
        let raw = self.send(self.client.get(&url)).await?;

        let entry = raw
            .get("symbols")
            .and_then(Value::as_array)
            .and_then(|symbols| {
                symbols
                    .iter()
                    .find(|s| s.get("symbol").and_then(Value::as_str) == Some(symbol))
            })
            .ok_or_else(|| ExchangeError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;

        Ok(parse_symbol_info(symbol, entry))
    }

    async fn get_account_balances(&self) -> ExchangeResult<AccountBalances> {
        let url = self.signed_url("/api/v3/account", vec![]);
        let raw = self.send(self.client.get(&url)).await?;

        let balances: Vec<Balance> = raw
            .get("balances")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|b| {
                        Some(Balance {
                            asset: b.get("asset")?.as_str()?.to_string(),
                            free: number(b, "free").unwrap_or(0.0),
                            locked: number(b, "locked").unwrap_or(0.0),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut total_value = 0.0;
        for balance in balances.iter().filter(|b| b.total() > 0.0) {
            if balance.asset.eq_ignore_ascii_case(&self.quote_asset) {
                total_value += balance.total();
                continue;
            }
            let pair = format!("{}{}", balance.asset, self.quote_asset);
            match self.get_ticker(&pair).await {
                Ok(ticker) => total_value += balance.total() * ticker.price,
                Err(e) => debug!("[MEXC] Skipping {} in account valuation: {}", pair, e),
            }
        }

        Ok(AccountBalances {
            balances,
            total_value,
        })
    }
}

/// Reads a numeric field that the venue may encode as a JSON string or number.
fn number(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Stringifies an order id regardless of its native JSON type.
pub(crate) fn order_id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_error(status: StatusCode, body: &str) -> ExchangeError {
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        if let Some(code) = v.get("code").and_then(Value::as_i64) {
            return ExchangeError::Api {
                code,
                message: v
                    .get("msg")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            };
        }
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ExchangeError::AuthFailed {
            reason: format!("HTTP {}", status.as_u16()),
        };
    }

    ExchangeError::Http {
        status: status.as_u16(),
        body: body.to_string(),
    }
}

pub(crate) fn parse_order_ack(raw: Value, fallback_symbol: &str) -> ExchangeResult<OrderAck> {
    let order_id = raw
        .get("orderId")
        .and_then(order_id_string)
        .ok_or_else(|| ExchangeError::Other("order response carried no orderId".to_string()))?;

    let executed_qty = number(&raw, "executedQty");
    let quote_filled = number(&raw, "cummulativeQuoteQty");
    let price = match (executed_qty, quote_filled) {
        (Some(qty), Some(quote)) if qty > 0.0 && quote > 0.0 => Some(quote / qty),
        _ => number(&raw, "price").filter(|p| *p > 0.0),
    };

    Ok(OrderAck {
        order_id,
        symbol: raw
            .get("symbol")
            .and_then(Value::as_str)
            .unwrap_or(fallback_symbol)
            .to_string(),
        status: raw
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("NEW")
            .to_string(),
        orig_qty: number(&raw, "origQty"),
        executed_qty,
        price,
        transact_time: raw.get("transactTime").and_then(Value::as_i64),
        raw,
    })
}

pub(crate) fn parse_symbol_info(symbol: &str, entry: &Value) -> SymbolInfo {
    let mut filters: Vec<SymbolFilter> = entry
        .get("filters")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_filter).collect())
        .unwrap_or_default();

    // MEXC usually omits `filters` and publishes precisions instead.
    if !filters
        .iter()
        .any(|f| matches!(f, SymbolFilter::LotSize { .. }))
    {
        let step = number(entry, "baseSizePrecision")
            .filter(|s| *s > 0.0)
            .or_else(|| {
                entry
                    .get("baseAssetPrecision")
                    .and_then(Value::as_i64)
                    .map(|p| 10f64.powi(-(p as i32)))
            });
        match step {
            Some(step) => filters.push(SymbolFilter::LotSize {
                min_qty: step,
                max_qty: number(entry, "maxQty").unwrap_or(f64::MAX),
                step_size: step,
            }),
            None => warn!("⚠️  [MEXC] No lot size information for {}", symbol),
        }
    }

    if !filters
        .iter()
        .any(|f| matches!(f, SymbolFilter::PriceFilter { .. }))
    {
        if let Some(p) = entry.get("quotePrecision").and_then(Value::as_i64) {
            filters.push(SymbolFilter::PriceFilter {
                min_price: 0.0,
                max_price: 0.0,
                tick_size: 10f64.powi(-(p as i32)),
            });
        }
    }

    if !filters
        .iter()
        .any(|f| matches!(f, SymbolFilter::MinNotional { .. }))
    {
        if let Some(min_notional) = number(entry, "quoteAmountPrecision").filter(|m| *m > 0.0) {
            filters.push(SymbolFilter::MinNotional { min_notional });
        }
    }

    SymbolInfo {
        symbol: symbol.to_string(),
        status: match entry.get("status") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "UNKNOWN".to_string(),
        },
        filters,
    }
}

fn parse_filter(value: &Value) -> Option<SymbolFilter> {
    match value.get("filterType")?.as_str()? {
        "LOT_SIZE" => Some(SymbolFilter::LotSize {
            min_qty: number(value, "minQty")?,
            max_qty: number(value, "maxQty")?,
            step_size: number(value, "stepSize")?,
        }),
        "PRICE_FILTER" => Some(SymbolFilter::PriceFilter {
            min_price: number(value, "minPrice").unwrap_or(0.0),
            max_price: number(value, "maxPrice").unwrap_or(0.0),
            tick_size: number(value, "tickSize")?,
        }),
        "MIN_NOTIONAL" | "NOTIONAL" => Some(SymbolFilter::MinNotional {
            min_notional: number(value, "minNotional")?,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn order_id_is_stringified_from_number() {
        let ack = parse_order_ack(
            json!({"orderId": 123456789, "symbol": "ABCUSDT", "status": "FILLED"}),
            "ABCUSDT",
        )
        .unwrap();
        assert_eq!(ack.order_id, "123456789");
        assert_eq!(ack.status, "FILLED");
    }

    #[test]
    fn order_id_kept_from_string() {
        let ack = parse_order_ack(json!({"orderId": "C02__4413"}), "ABCUSDT").unwrap();
        assert_eq!(ack.order_id, "C02__4413");
        assert_eq!(ack.symbol, "ABCUSDT");
    }

    #[test]
    fn missing_order_id_is_an_error() {
        assert!(parse_order_ack(json!({"orderId": ""}), "ABCUSDT").is_err());
        assert!(parse_order_ack(json!({"status": "NEW"}), "ABCUSDT").is_err());
    }

    #[test]
    fn average_fill_price_from_quote_quantity() {
        let ack = parse_order_ack(
            json!({
                "orderId": 1,
                "executedQty": "2",
                "cummulativeQuoteQty": "100",
                "price": "0"
            }),
            "ABCUSDT",
        )
        .unwrap();
        assert_eq!(ack.executed_qty, Some(2.0));
        assert_eq!(ack.price, Some(50.0));
    }

    #[test]
    fn api_error_envelope_is_parsed() {
        let err = parse_error(
            StatusCode::BAD_REQUEST,
            r#"{"code":10007,"msg":"symbol not support api"}"#,
        );
        assert_eq!(err.code(), Some(10007));
    }

    #[test]
    fn non_json_error_maps_to_http() {
        let err = parse_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(matches!(err, ExchangeError::Http { status: 502, .. }));
        assert_eq!(err.code(), None);
    }

    #[test]
    fn explicit_filters_are_parsed() {
        let info = parse_symbol_info(
            "BTCUSDT",
            &json!({
                "symbol": "BTCUSDT",
                "status": "TRADING",
                "filters": [
                    {"filterType": "LOT_SIZE", "minQty": "0.0001", "maxQty": "100", "stepSize": "0.0001"},
                    {"filterType": "PRICE_FILTER", "minPrice": "0.01", "maxPrice": "1000000", "tickSize": "0.01"},
                    {"filterType": "MIN_NOTIONAL", "minNotional": "5"},
                    {"filterType": "ICEBERG_PARTS", "limit": 10}
                ]
            }),
        );
        assert_eq!(info.filters.len(), 3);
        assert!(info.filters.contains(&SymbolFilter::MinNotional { min_notional: 5.0 }));
    }

    #[test]
    fn filters_derived_from_mexc_precisions() {
        let info = parse_symbol_info(
            "NEWUSDT",
            &json!({
                "symbol": "NEWUSDT",
                "status": "1",
                "baseSizePrecision": "0.01",
                "quotePrecision": 4,
                "quoteAmountPrecision": "5"
            }),
        );
        assert_eq!(info.status, "1");
        assert!(info.filters.iter().any(|f| matches!(
            f,
            SymbolFilter::LotSize { step_size, .. } if (*step_size - 0.01).abs() < 1e-12
        )));
        assert!(info.filters.iter().any(|f| matches!(
            f,
            SymbolFilter::PriceFilter { tick_size, .. } if (*tick_size - 0.0001).abs() < 1e-12
        )));
        assert!(info.filters.contains(&SymbolFilter::MinNotional { min_notional: 5.0 }));
    }
}
