//! Retry with exponential backoff for order submission.
//!
//! Only the "symbol not yet tradeable" exchange code is retried. Anything
//! else (balance, auth, network) surfaces on the first occurrence so the
//! caller never hammers the venue with an order that cannot succeed.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::RetryConfig;
use crate::constants::{events, retry::JITTER_FRACTION};
use crate::error::{ExchangeError, TradingError};
use crate::exchange::traits::ExchangeResult;

#[derive(Clone, Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
    not_tradeable_code: i64,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig, not_tradeable_code: i64) -> Self {
        Self {
            config,
            not_tradeable_code,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn is_retryable(&self, err: &ExchangeError) -> bool {
        err.code() == Some(self.not_tradeable_code)
    }

    /// Delay before retry number `retry` (0-based), before jitter.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let max = self.config.max_delay_ms as f64;
        let delay = self.config.initial_delay_ms as f64
            * self.config.backoff_multiplier.powi(retry.min(i32::MAX as u32) as i32);
        Duration::from_millis(delay.min(max).max(0.0) as u64)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.config.jitter || delay.is_zero() {
            return delay;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-JITTER_FRACTION..=JITTER_FRACTION);
        let capped = (delay.as_millis() as f64 * factor).min(self.config.max_delay_ms as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Run `order_fn` until it succeeds, fails with a non-retryable error, or
    /// `max_retries` total attempts have been made.
    pub async fn execute_order_with_retry<T, F, Fut>(&self, mut order_fn: F) -> Result<T, TradingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ExchangeResult<T>>,
    {
        let max_attempts = self.config.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match order_fn().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("[RETRY] Order accepted on attempt {}/{}", attempt, max_attempts);
                    }
                    return Ok(value);
                }
                Err(err) if self.is_retryable(&err) => {
                    last_error = err.safe_message();
                    if attempt == max_attempts {
                        break;
                    }
                    let delay = self.jittered(self.backoff_delay(attempt - 1));
                    warn!(
                        event = events::ORDER_RETRY,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "🔄 [RETRY] Symbol not yet tradeable, retrying in {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    debug!("[RETRY] Non-retryable error on attempt {}: {}", attempt, err);
                    return Err(TradingError::Exchange(err));
                }
            }
        }

        warn!(
            "❌ [RETRY] Giving up after {} attempts: {}",
            max_attempts, last_error
        );
        Err(TradingError::MaxRetries {
            attempts: max_attempts,
            last_error,
        })
    }
}
