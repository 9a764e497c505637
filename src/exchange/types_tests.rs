//! Unit tests for exchange wire types.

#[cfg(test)]
mod types_tests {
    use crate::exchange::types::*;

    // ============= Side Tests =============

    #[test]
    fn test_side_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&Side::Sell).unwrap(), "\"SELL\"");
    }

    #[test]
    fn test_side_rejects_unknown() {
        assert!(serde_json::from_str::<Side>("\"HOLD\"").is_err());
        assert!(serde_json::from_str::<Side>("\"buy\"").is_err());
    }

    // ============= OrderType Tests =============

    #[test]
    fn test_order_type_wire_names() {
        assert_eq!(serde_json::to_string(&OrderType::Market).unwrap(), "\"MARKET\"");
        assert_eq!(serde_json::to_string(&OrderType::StopLimit).unwrap(), "\"STOP_LIMIT\"");
        let parsed: OrderType = serde_json::from_str("\"STOP_LIMIT\"").unwrap();
        assert_eq!(parsed, OrderType::StopLimit);
        assert_eq!(OrderType::StopLimit.as_str(), "STOP_LIMIT");
    }

    #[test]
    fn test_order_type_requires_price() {
        assert!(!OrderType::Market.requires_price());
        assert!(OrderType::Limit.requires_price());
        assert!(OrderType::StopLimit.requires_price());
    }

    // ============= TimeInForce Tests =============

    #[test]
    fn test_time_in_force_values() {
        for (tif, name) in [
            (TimeInForce::Gtc, "GTC"),
            (TimeInForce::Ioc, "IOC"),
            (TimeInForce::Fok, "FOK"),
        ] {
            assert_eq!(tif.as_str(), name);
            assert_eq!(serde_json::to_string(&tif).unwrap(), format!("\"{}\"", name));
        }
        assert!(serde_json::from_str::<TimeInForce>("\"DAY\"").is_err());
    }

    // ============= SymbolFilter Tests =============

    #[test]
    fn test_symbol_filter_tagged_yaml() {
        let yaml = r#"
- filterType: LOT_SIZE
  minQty: 0.01
  maxQty: 1000
  stepSize: 0.01
- filterType: MIN_NOTIONAL
  minNotional: 5
"#;
        let filters: Vec<SymbolFilter> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(
            filters[0],
            SymbolFilter::LotSize {
                min_qty: 0.01,
                max_qty: 1000.0,
                step_size: 0.01
            }
        );
        assert_eq!(filters[1], SymbolFilter::MinNotional { min_notional: 5.0 });
    }

    // ============= Balance Tests =============

    #[test]
    fn test_balance_total_and_lookup() {
        let balances = AccountBalances {
            balances: vec![
                Balance {
                    asset: "USDT".to_string(),
                    free: 500.0,
                    locked: 25.0,
                },
                Balance {
                    asset: "BTC".to_string(),
                    free: 0.1,
                    locked: 0.0,
                },
            ],
            total_value: 10_000.0,
        };
        assert_eq!(balances.balances[0].total(), 525.0);
        assert_eq!(balances.free("usdt"), 500.0);
        assert_eq!(balances.free("ETH"), 0.0);
    }
}
