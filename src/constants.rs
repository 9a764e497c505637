//! Application-wide constants and exchange codes
//!
//! Values here are defaults; anything a deployment may need to tune is also
//! exposed through `config.yaml`.

/// MEXC spot API error codes (https://mexcdevelop.github.io/apidocs/spot_v3_en/#error-code)
pub mod mexc {
    /// "Symbol not support API", returned while a freshly listed pair is not
    /// yet open for trading. The only error the retry layer retries.
    pub const SYMBOL_NOT_TRADEABLE: i64 = 10007;

    /// Insufficient balance
    pub const INSUFFICIENT_BALANCE: i64 = 30004;

    /// Invalid symbol
    pub const INVALID_SYMBOL: i64 = -1121;

    pub const DEFAULT_BASE_URL: &str = "https://api.mexc.com";

    pub const DEFAULT_RECV_WINDOW_MS: u64 = 5000;

    pub const API_KEY_HEADER: &str = "X-MEXC-APIKEY";
}

/// Order execution constants
pub mod execution {
    /// Minimum order value in quote currency accepted by the venue
    pub const MIN_ORDER_VALUE_USDT: f64 = 5.0;

    /// Default quote asset for sizing and valuation
    pub const QUOTE_ASSET: &str = "USDT";

    /// Targets below this confidence are skipped by the auto sniper
    pub const MIN_SNIPE_CONFIDENCE: f64 = 0.7;
}

/// Position monitoring constants
pub mod position_monitor {
    pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 5_000;
    pub const DEFAULT_TAKE_PROFIT_PCT: f64 = 10.0;
    pub const DEFAULT_STOP_LOSS_PCT: f64 = 5.0;

    /// Tolerance when comparing P/L percentages against thresholds
    pub const PCT_EPSILON: f64 = 1e-9;
}

/// Retry constants
pub mod retry {
    pub const DEFAULT_MAX_RETRIES: u32 = 10;
    pub const DEFAULT_INITIAL_DELAY_MS: u64 = 100;
    pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;
    pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

    /// Jitter spread as a fraction of the computed delay (±25%)
    pub const JITTER_FRACTION: f64 = 0.25;
}

/// Execution window constants
pub mod window {
    pub const DEFAULT_PRE_LAUNCH_OFFSET_MS: i64 = -500;
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
    pub const DEFAULT_WINDOW_DURATION_MS: u64 = 30_000;
}

/// Logging event names for structured logging
pub mod events {
    pub const ORDER_RETRY: &str = "order_retry";
    pub const ORDER_FILLED: &str = "order_filled";
    pub const ORDER_FAILED: &str = "order_failed";
    pub const POSITION_OPENED: &str = "position_opened";
    pub const POSITION_CLOSED: &str = "position_closed";
    pub const STOP_LOSS_TRIGGERED: &str = "stop_loss_triggered";
    pub const TAKE_PROFIT_TRIGGERED: &str = "take_profit_triggered";
    pub const WINDOW_OPENED: &str = "execution_window_opened";
    pub const SNIPE_SKIPPED: &str = "snipe_skipped";
}
