use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::constants;
use crate::error::TradingError;
use crate::exchange::types::SymbolFilter;
use crate::services::sniper::SnipeTarget;

#[derive(Clone, Debug, Deserialize)]
pub struct MexcConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_mexc_base_url")]
    pub base_url: String,
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
}

impl Default for MexcConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            base_url: default_mexc_base_url(),
            recv_window_ms: default_recv_window_ms(),
        }
    }
}

fn default_mexc_base_url() -> String {
    constants::mexc::DEFAULT_BASE_URL.to_string()
}
fn default_recv_window_ms() -> u64 {
    constants::mexc::DEFAULT_RECV_WINDOW_MS
}

/// One simulated market for the paper exchange.
#[derive(Clone, Debug, Deserialize)]
pub struct PaperMarketConfig {
    pub symbol: String,
    pub price: f64,
    #[serde(default)]
    pub filters: Option<Vec<SymbolFilter>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PaperConfig {
    #[serde(default)]
    pub balances: HashMap<String, f64>,
    #[serde(default)]
    pub markets: Vec<PaperMarketConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExecutionConfig {
    /// Orders worth less than this (quote currency) are rejected before submission.
    #[serde(default = "default_min_order_value")]
    pub min_order_value: f64,
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    /// Exchange code meaning "symbol not yet tradeable"; the only retried error.
    #[serde(default = "default_not_tradeable_code")]
    pub not_tradeable_code: i64,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            min_order_value: default_min_order_value(),
            quote_asset: default_quote_asset(),
            not_tradeable_code: default_not_tradeable_code(),
            min_confidence: default_min_confidence(),
        }
    }
}

fn default_min_order_value() -> f64 {
    constants::execution::MIN_ORDER_VALUE_USDT
}
fn default_quote_asset() -> String {
    constants::execution::QUOTE_ASSET.to_string()
}
fn default_not_tradeable_code() -> i64 {
    constants::mexc::SYMBOL_NOT_TRADEABLE
}
fn default_min_confidence() -> f64 {
    constants::execution::MIN_SNIPE_CONFIDENCE
}

#[derive(Clone, Debug, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

fn default_max_retries() -> u32 {
    constants::retry::DEFAULT_MAX_RETRIES
}
fn default_initial_delay_ms() -> u64 {
    constants::retry::DEFAULT_INITIAL_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    constants::retry::DEFAULT_MAX_DELAY_MS
}
fn default_backoff_multiplier() -> f64 {
    constants::retry::DEFAULT_BACKOFF_MULTIPLIER
}

#[derive(Clone, Debug, Deserialize)]
pub struct WindowConfig {
    /// Added to the launch time; negative values open the window early.
    #[serde(default = "default_pre_launch_offset_ms")]
    pub pre_launch_offset_ms: i64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_window_duration_ms")]
    pub window_duration_ms: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            pre_launch_offset_ms: default_pre_launch_offset_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            window_duration_ms: default_window_duration_ms(),
        }
    }
}

fn default_pre_launch_offset_ms() -> i64 {
    constants::window::DEFAULT_PRE_LAUNCH_OFFSET_MS
}
fn default_poll_interval_ms() -> u64 {
    constants::window::DEFAULT_POLL_INTERVAL_MS
}
fn default_window_duration_ms() -> u64 {
    constants::window::DEFAULT_WINDOW_DURATION_MS
}

#[derive(Clone, Debug, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    #[serde(default = "default_take_profit_percent")]
    pub take_profit_percent: f64,
    #[serde(default = "default_stop_loss_percent")]
    pub stop_loss_percent: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_check_interval_ms(),
            take_profit_percent: default_take_profit_percent(),
            stop_loss_percent: default_stop_loss_percent(),
        }
    }
}

fn default_check_interval_ms() -> u64 {
    constants::position_monitor::DEFAULT_CHECK_INTERVAL_MS
}
fn default_take_profit_percent() -> f64 {
    constants::position_monitor::DEFAULT_TAKE_PROFIT_PCT
}
fn default_stop_loss_percent() -> f64 {
    constants::position_monitor::DEFAULT_STOP_LOSS_PCT
}

#[derive(Clone, Debug, Deserialize)]
pub struct SizingConfig {
    /// Fraction of total equity risked per trade.
    #[serde(default = "default_per_trade_fraction")]
    pub per_trade_fraction: f64,
    /// Fraction of the free quote balance one trade may consume.
    #[serde(default = "default_max_utilization_fraction")]
    pub max_utilization_fraction: f64,
    #[serde(default = "default_min_position_usdt")]
    pub min_position_usdt: f64,
    #[serde(default)]
    pub max_position_usdt: Option<f64>,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            per_trade_fraction: default_per_trade_fraction(),
            max_utilization_fraction: default_max_utilization_fraction(),
            min_position_usdt: default_min_position_usdt(),
            max_position_usdt: None,
        }
    }
}

fn default_per_trade_fraction() -> f64 {
    0.02
}
fn default_max_utilization_fraction() -> f64 {
    0.1
}
fn default_min_position_usdt() -> f64 {
    constants::execution::MIN_ORDER_VALUE_USDT
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// "mexc" or "paper"
    #[serde(default = "default_exchange")]
    pub exchange: String,

    #[serde(default)]
    pub mexc: MexcConfig,
    #[serde(default)]
    pub paper: PaperConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub sizing: SizingConfig,

    #[serde(default = "default_journal_path")]
    pub journal_path: String,

    #[serde(default)]
    pub targets: Vec<SnipeTarget>,
}

fn default_exchange() -> String {
    "paper".to_string()
}
fn default_journal_path() -> String {
    "./data/trades.jsonl".to_string()
}

impl AppConfig {
    /// Load `CONFIG_PATH` (default `config.yaml`) and overlay secrets from the
    /// environment.
    pub fn load() -> Result<Self, TradingError> {
        dotenvy::dotenv().ok();

        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        let mut config = Self::from_file(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TradingError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| TradingError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, TradingError> {
        // Strip BOM if present
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);

        serde_yaml::from_str(content)
            .map_err(|e| TradingError::Config(format!("Failed to parse config: {}", e)))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MEXC_API_KEY") {
            self.mexc.api_key = v;
        }
        if let Ok(v) = std::env::var("MEXC_SECRET_KEY") {
            self.mexc.secret_key = v;
        }
        if let Ok(v) = std::env::var("MEXC_BASE_URL") {
            self.mexc.base_url = v;
        }
    }

    pub fn validate(&self) -> Result<(), TradingError> {
        if self.retry.max_retries == 0 {
            return Err(TradingError::Config("retry.max_retries must be at least 1".into()));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(TradingError::Config("retry.backoff_multiplier must be >= 1.0".into()));
        }
        if self.window.poll_interval_ms == 0 || self.monitor.check_interval_ms == 0 {
            return Err(TradingError::Config("polling intervals must be positive".into()));
        }
        if self.monitor.take_profit_percent <= 0.0 || self.monitor.stop_loss_percent <= 0.0 {
            return Err(TradingError::Config(
                "monitor take_profit_percent/stop_loss_percent must be positive".into(),
            ));
        }
        if let Some(max) = self.sizing.max_position_usdt {
            if max < self.sizing.min_position_usdt {
                return Err(TradingError::Config(
                    "sizing.max_position_usdt is below min_position_usdt".into(),
                ));
            }
        }
        Ok(())
    }
}
