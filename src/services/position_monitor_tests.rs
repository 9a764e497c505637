//! Unit tests for the take-profit / stop-loss monitor.

#[cfg(test)]
mod position_monitor_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::config::MonitorConfig;
    use crate::events::CloseReason;
    use crate::exchange::paper::{default_filters, PaperExchange};
    use crate::exchange::traits::TradingApi;
    use crate::services::position_monitor::*;

    struct Recorder {
        tp: mpsc::UnboundedSender<TakeProfitEvent>,
        cancel: mpsc::UnboundedSender<CancelEvent>,
    }

    #[async_trait]
    impl ExitHandler for Recorder {
        async fn on_take_profit(&self, event: TakeProfitEvent) {
            let _ = self.tp.send(event);
        }

        async fn on_cancel(&self, event: CancelEvent) {
            let _ = self.cancel.send(event);
        }
    }

    fn recorder() -> (
        Arc<dyn ExitHandler>,
        mpsc::UnboundedReceiver<TakeProfitEvent>,
        mpsc::UnboundedReceiver<CancelEvent>,
    ) {
        let (tp, tp_rx) = mpsc::unbounded_channel();
        let (cancel, cancel_rx) = mpsc::unbounded_channel();
        (Arc::new(Recorder { tp, cancel }), tp_rx, cancel_rx)
    }

    fn config() -> MonitorConfig {
        MonitorConfig {
            check_interval_ms: 1_000,
            take_profit_percent: 10.0,
            stop_loss_percent: 5.0,
        }
    }

    fn setup(symbol: &str, price: f64) -> (Arc<PaperExchange>, PositionMonitor) {
        let paper = Arc::new(PaperExchange::new("USDT"));
        paper.list_symbol(symbol, price, default_filters());
        let exchange: Arc<dyn TradingApi> = paper.clone();
        (paper, PositionMonitor::new(exchange, config()))
    }

    // ============= Exit Decision Tests =============

    #[test]
    fn test_profit_percent() {
        assert!((profit_percent(50_000.0, 55_000.0) - 10.0).abs() < 1e-9);
        assert!((profit_percent(3_000.0, 2_850.0) + 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_evaluate_exit_thresholds() {
        let cfg = config();
        assert_eq!(evaluate_exit(profit_percent(50_000.0, 55_000.0), &cfg), ExitDecision::TakeProfit);
        assert_eq!(evaluate_exit(profit_percent(3_000.0, 2_850.0), &cfg), ExitDecision::StopLoss);
        assert_eq!(evaluate_exit(9.99, &cfg), ExitDecision::Hold);
        assert_eq!(evaluate_exit(-4.99, &cfg), ExitDecision::Hold);
        assert_eq!(evaluate_exit(0.0, &cfg), ExitDecision::Hold);
    }

    // ============= Trigger Tests =============

    #[tokio::test(start_paused = true)]
    async fn test_take_profit_fires_and_stops() {
        let (paper, monitor) = setup("BTCUSDT", 55_000.0);
        let (handler, mut tp_rx, mut cancel_rx) = recorder();

        assert!(monitor.start_monitoring(Position::open(1, "BTCUSDT", 50_000.0, 0.1, None), handler));

        let event = tp_rx.recv().await.unwrap();
        assert_eq!(event.position_id, 1);
        assert_eq!(event.symbol, "BTCUSDT");
        assert_eq!(event.current_price, 55_000.0);
        assert!((event.profit_percent - 10.0).abs() < 1e-9);
        assert_eq!(event.quantity, 0.1);
        assert!(!monitor.is_monitoring(1));
        assert_eq!(paper.ticker_calls("BTCUSDT"), 1);

        // No further ticks for this position.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(paper.ticker_calls("BTCUSDT"), 1);
        assert!(cancel_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_loss_fires_with_reason() {
        let (paper, monitor) = setup("ETHUSDT", 2_850.0);
        let (handler, mut tp_rx, mut cancel_rx) = recorder();

        monitor.start_monitoring(Position::open(7, "ETHUSDT", 3_000.0, 1.5, None), handler);

        let event = cancel_rx.recv().await.unwrap();
        assert_eq!(event.position_id, 7);
        assert_eq!(event.reason, CloseReason::StopLoss);
        assert_eq!(event.reason.as_str(), "stop_loss");
        assert!((event.profit_percent + 5.0).abs() < 1e-9);
        assert!(!monitor.is_monitoring(7));
        assert!(tp_rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(paper.ticker_calls("ETHUSDT"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_band_price_keeps_monitoring() {
        let (paper, monitor) = setup("BTCUSDT", 52_000.0);
        let (handler, mut tp_rx, mut cancel_rx) = recorder();

        monitor.start_monitoring(Position::open(1, "BTCUSDT", 50_000.0, 0.1, None), handler);
        tokio::time::sleep(Duration::from_millis(3_500)).await;

        assert_eq!(paper.ticker_calls("BTCUSDT"), 3);
        assert!(monitor.is_monitoring(1));
        assert!(tp_rx.try_recv().is_err());
        assert!(cancel_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_start_creates_one_timer() {
        let (paper, monitor) = setup("BTCUSDT", 50_000.0);
        let (handler, _tp_rx, _cancel_rx) = recorder();
        let position = Position::open(1, "BTCUSDT", 50_000.0, 0.1, None);

        assert!(monitor.start_monitoring(position.clone(), Arc::clone(&handler)));
        assert!(!monitor.start_monitoring(position, handler));
        assert_eq!(monitor.get_status().active_count, 1);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(paper.ticker_calls("BTCUSDT"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_price_error_keeps_monitoring() {
        let (paper, monitor) = setup("BTCUSDT", 50_000.0);
        let (handler, mut tp_rx, _cancel_rx) = recorder();
        paper.fail_ticker("BTCUSDT", true);

        monitor.start_monitoring(Position::open(1, "BTCUSDT", 50_000.0, 0.1, None), handler);
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(paper.ticker_calls("BTCUSDT"), 2);
        assert!(monitor.is_monitoring(1));

        paper.fail_ticker("BTCUSDT", false);
        paper.set_price("BTCUSDT", 56_000.0);
        let event = tp_rx.recv().await.unwrap();
        assert_eq!(event.current_price, 56_000.0);
    }

    // ============= Order Cancel Tests =============

    #[tokio::test(start_paused = true)]
    async fn test_trigger_cancels_open_order() {
        let (paper, monitor) = setup("BTCUSDT", 55_000.0);
        let (handler, mut tp_rx, _cancel_rx) = recorder();

        monitor.start_monitoring(
            Position::open(1, "BTCUSDT", 50_000.0, 0.1, Some("42".to_string())),
            handler,
        );
        tp_rx.recv().await.unwrap();
        assert_eq!(paper.cancelled_orders(), vec!["42".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_failure_does_not_block_callback() {
        let (paper, monitor) = setup("BTCUSDT", 55_000.0);
        let (handler, mut tp_rx, _cancel_rx) = recorder();
        paper.fail_cancels(true);

        monitor.start_monitoring(
            Position::open(1, "BTCUSDT", 50_000.0, 0.1, Some("42".to_string())),
            handler,
        );
        let event = tp_rx.recv().await.unwrap();
        assert_eq!(event.position_id, 1);
        assert!(paper.cancelled_orders().is_empty());
    }

    // ============= Stop Tests =============

    #[tokio::test(start_paused = true)]
    async fn test_stop_clears_all_timers() {
        let (paper, monitor) = setup("BTCUSDT", 50_000.0);
        paper.list_symbol("ETHUSDT", 3_000.0, default_filters());
        let (handler, _tp_rx, _cancel_rx) = recorder();

        monitor.start_monitoring(Position::open(1, "BTCUSDT", 50_000.0, 0.1, None), Arc::clone(&handler));
        monitor.start_monitoring(Position::open(2, "ETHUSDT", 3_000.0, 1.0, None), handler);
        assert_eq!(monitor.active_count(), 2);

        monitor.stop();
        assert_eq!(monitor.active_count(), 0);
        assert!(monitor.get_status().positions.is_empty());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(paper.ticker_calls("BTCUSDT"), 0);
        assert_eq!(paper.ticker_calls("ETHUSDT"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_monitoring_single_position() {
        let (paper, monitor) = setup("BTCUSDT", 50_000.0);
        let (handler, _tp_rx, _cancel_rx) = recorder();

        monitor.start_monitoring(Position::open(1, "BTCUSDT", 50_000.0, 0.1, None), handler);
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        assert!(monitor.stop_monitoring(1));
        assert!(!monitor.stop_monitoring(1));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(paper.ticker_calls("BTCUSDT"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_can_be_monitored_again_after_exit() {
        let (paper, monitor) = setup("BTCUSDT", 55_000.0);
        let (handler, mut tp_rx, _cancel_rx) = recorder();
        let position = Position::open(1, "BTCUSDT", 50_000.0, 0.1, None);

        monitor.start_monitoring(position.clone(), Arc::clone(&handler));
        tp_rx.recv().await.unwrap();

        paper.set_price("BTCUSDT", 50_000.0);
        assert!(monitor.start_monitoring(position, handler));
        assert!(monitor.is_monitoring(1));
    }

    #[test]
    fn test_status_reports_config() {
        let paper = Arc::new(PaperExchange::new("USDT"));
        let monitor = PositionMonitor::new(paper, config());
        let status = monitor.get_status();
        assert_eq!(status.active_count, 0);
        assert_eq!(status.check_interval_ms, 1_000);
        assert_eq!(status.take_profit_percent, 10.0);
        assert_eq!(status.stop_loss_percent, 5.0);
    }
}
