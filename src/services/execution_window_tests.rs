//! Unit tests for execution window timing.

#[cfg(test)]
mod execution_window_tests {
    use std::time::{Duration as StdDuration, Instant};

    use chrono::{Duration, Utc};
    use tokio_util::sync::CancellationToken;

    use crate::config::WindowConfig;
    use crate::error::TradingError;
    use crate::services::execution_window::{
        is_within_execution_window, wait_for_execution_window, ExecutionWindow,
    };

    fn options(offset_ms: i64) -> WindowConfig {
        WindowConfig {
            pre_launch_offset_ms: offset_ms,
            poll_interval_ms: 10,
            window_duration_ms: 30_000,
        }
    }

    // ============= Window Bounds Tests =============

    #[test]
    fn test_window_bounds_from_launch() {
        let launch = Utc::now() + Duration::hours(1);
        let window = ExecutionWindow::for_launch(launch, &options(-500));

        assert_eq!(window.start_time, launch - Duration::milliseconds(500));
        assert_eq!(window.end_time, window.start_time + Duration::milliseconds(30_000));
        assert!(!window.is_open());
    }

    #[test]
    fn test_is_within_execution_window() {
        assert!(is_within_execution_window(Utc::now() + Duration::seconds(5)));
        assert!(!is_within_execution_window(Utc::now() - Duration::milliseconds(1)));
    }

    // ============= Wait Tests =============

    #[tokio::test]
    async fn test_past_launch_returns_immediately() {
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let window = wait_for_execution_window(Utc::now() - Duration::seconds(10), &options(0), &cancel)
            .await
            .unwrap();

        assert!(started.elapsed() < StdDuration::from_millis(50));
        assert!(window.start_time <= Utc::now());
    }

    #[tokio::test]
    async fn test_waits_until_window_start() {
        let cancel = CancellationToken::new();
        let launch = Utc::now() + Duration::milliseconds(150);

        let window = wait_for_execution_window(launch, &options(-50), &cancel)
            .await
            .unwrap();

        // Never returns before the window start.
        assert!(Utc::now() >= window.start_time);
        assert!(window.is_open());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_wait() {
        let cancel = CancellationToken::new();
        let launch = Utc::now() + Duration::hours(2);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(StdDuration::from_millis(30)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = wait_for_execution_window(launch, &options(0), &cancel).await;

        assert!(matches!(result, Err(TradingError::Cancelled)));
        assert!(started.elapsed() < StdDuration::from_secs(2));
    }

    #[tokio::test]
    async fn test_already_cancelled_token() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = wait_for_execution_window(Utc::now() - Duration::seconds(1), &options(0), &cancel).await;
        assert!(matches!(result, Err(TradingError::Cancelled)));
    }
}
