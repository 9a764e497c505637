use std::sync::Arc;

use tracing::info;

use crate::{config::AppConfig, error::TradingError};

use super::{mexc::MexcExchange, paper::PaperExchange, traits::TradingApi};

pub fn build_exchange(config: &AppConfig) -> Result<Arc<dyn TradingApi>, TradingError> {
    let quote_asset = &config.execution.quote_asset;

    match config.exchange.to_lowercase().as_str() {
        "mexc" => {
            let ex = MexcExchange::new(config.mexc.clone(), quote_asset)?;
            info!("[FACTORY] Using MEXC at {}", config.mexc.base_url);
            Ok(Arc::new(ex))
        }
        "paper" => {
            info!("[FACTORY] Using paper exchange (no real orders)");
            Ok(Arc::new(PaperExchange::from_config(&config.paper, quote_asset)))
        }
        other => Err(TradingError::Config(format!(
            "Unknown exchange '{}' (expected mexc|paper)",
            other
        ))),
    }
}
