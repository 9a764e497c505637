//! Custom error types for the sniping engine
//!
//! Exchange-level failures are kept apart from business-level failures so the
//! retry layer can classify them by exchange code without string matching.

use thiserror::Error;

/// Top-level execution errors
#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unable to get current price for {symbol}")]
    PriceUnavailable { symbol: String },

    #[error("Unable to get symbol info for {symbol}")]
    SymbolInfoUnavailable { symbol: String },

    #[error("Max retries ({attempts}) exceeded: {last_error}")]
    MaxRetries { attempts: u32, last_error: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Exchange API error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TradingError {
    /// Message-only form that is safe to hand to callers outside the engine.
    pub fn safe_message(&self) -> String {
        match self {
            TradingError::Exchange(e) => e.safe_message(),
            other => other.to_string(),
        }
    }
}

/// Exchange-specific errors
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Exchange error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("Authentication failed: {reason}")]
    AuthFailed { reason: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ExchangeError {
    /// Venue error code, when the exchange supplied one.
    pub fn code(&self) -> Option<i64> {
        match self {
            ExchangeError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Strips response bodies and transport details, which may echo request
    /// parameters, down to something printable for callers.
    pub fn safe_message(&self) -> String {
        match self {
            ExchangeError::Api { code, message } => format!("Exchange error {}: {}", code, message),
            ExchangeError::Http { status, .. } => format!("Exchange returned HTTP {}", status),
            ExchangeError::Network(_) => "Network error while contacting exchange".to_string(),
            ExchangeError::Deserialization(_) => "Unexpected exchange response".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<String> for ExchangeError {
    fn from(err: String) -> Self {
        ExchangeError::Other(err)
    }
}

impl From<&str> for ExchangeError {
    fn from(err: &str) -> Self {
        ExchangeError::Other(err.to_string())
    }
}
