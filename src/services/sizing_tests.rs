//! Unit tests for position sizing.

#[cfg(test)]
mod sizing_tests {
    use std::sync::Arc;

    use chrono::Utc;

    use crate::config::SizingConfig;
    use crate::exchange::paper::{default_filters, PaperExchange};
    use crate::services::sizing::*;
    use crate::services::sniper::SnipeTarget;

    fn config() -> SizingConfig {
        SizingConfig {
            per_trade_fraction: 0.02,
            max_utilization_fraction: 0.1,
            min_position_usdt: 5.0,
            max_position_usdt: None,
        }
    }

    fn target(hint: Option<f64>) -> SnipeTarget {
        SnipeTarget {
            id: "t-1".to_string(),
            symbol: "NEWUSDT".to_string(),
            launch_time: Utc::now(),
            position_size_hint: hint,
            confidence_score: 0.9,
        }
    }

    fn balance(total_equity: f64, free_balance: f64) -> BalanceSummary {
        BalanceSummary {
            total_equity,
            free_balance,
        }
    }

    // ============= Dynamic Sizing Tests =============

    #[test]
    fn test_takes_smallest_candidate() {
        let size = compute_dynamic_position_size_usdt(
            Some(&balance(10_000.0, 500.0)),
            &config(),
            &target(None),
            &SizingOptions::default(),
        );
        // min(10000 * 0.02 = 200, 500 * 0.1 = 50)
        assert_eq!(size, 50.0);
    }

    #[test]
    fn test_hard_cap_applies() {
        let mut cfg = config();
        cfg.max_position_usdt = Some(30.0);
        let size = compute_dynamic_position_size_usdt(
            Some(&balance(10_000.0, 500.0)),
            &cfg,
            &target(None),
            &SizingOptions::default(),
        );
        assert_eq!(size, 30.0);

        let tighter = SizingOptions {
            max_position_usdt: Some(20.0),
        };
        let size = compute_dynamic_position_size_usdt(Some(&balance(10_000.0, 500.0)), &cfg, &target(None), &tighter);
        assert_eq!(size, 20.0);
    }

    #[test]
    fn test_clamped_to_minimum() {
        let size = compute_dynamic_position_size_usdt(
            Some(&balance(100.0, 10.0)),
            &config(),
            &target(None),
            &SizingOptions::default(),
        );
        // min(2, 1) is below the 5 floor
        assert_eq!(size, 5.0);
    }

    #[test]
    fn test_missing_balance_uses_hint() {
        let size = compute_dynamic_position_size_usdt(None, &config(), &target(Some(25.0)), &SizingOptions::default());
        assert_eq!(size, 25.0);
    }

    #[test]
    fn test_missing_balance_without_hint_uses_floor() {
        let size = compute_dynamic_position_size_usdt(None, &config(), &target(None), &SizingOptions::default());
        assert_eq!(size, 5.0);
    }

    #[test]
    fn test_zero_balance_falls_back() {
        let size = compute_dynamic_position_size_usdt(
            Some(&balance(0.0, 0.0)),
            &config(),
            &target(Some(12.0)),
            &SizingOptions::default(),
        );
        assert_eq!(size, 12.0);
    }

    #[test]
    fn test_non_finite_balance_falls_back() {
        let size = compute_dynamic_position_size_usdt(
            Some(&balance(f64::INFINITY, f64::INFINITY)),
            &config(),
            &target(None),
            &SizingOptions::default(),
        );
        assert_eq!(size, 5.0);
    }

    // ============= PositionSizer Tests =============

    #[tokio::test]
    async fn test_sizer_reads_exchange_balances() {
        let paper = PaperExchange::new("USDT");
        paper.list_symbol("NEWUSDT", 1.0, default_filters());
        paper.set_balance("USDT", 1_000.0);

        let sizer = PositionSizer::new(Arc::new(paper), config(), "USDT");
        let size = sizer.size_for(&target(None), &SizingOptions::default()).await;
        // min(1000 * 0.02 = 20, 1000 * 0.1 = 100)
        assert!((size - 20.0).abs() < 1e-9);
    }
}
