//! Exchange compliance checks for order quantity and price.
//!
//! Filters are taken as authoritative: callers fetch them fresh for every
//! execution and must not submit when `is_valid` is false.

use rust_decimal::prelude::{Decimal, FromPrimitive, ToPrimitive};
use serde::Serialize;

use crate::exchange::types::SymbolFilter;

#[derive(Clone, Debug, Default, Serialize)]
pub struct ValidationDetails {
    pub original_quantity: f64,
    pub original_price: f64,
    pub step_size: Option<f64>,
    pub quantity_precision: Option<u32>,
    pub min_qty: Option<f64>,
    pub max_qty: Option<f64>,
    pub tick_size: Option<f64>,
    pub notional: Option<f64>,
    pub min_notional: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct QuantityValidation {
    pub is_valid: bool,
    pub adjusted_quantity: f64,
    /// Price rounded down to the tick size when a PRICE_FILTER is present.
    pub adjusted_price: f64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub details: ValidationDetails,
}

/// Number of decimal places implied by a step or tick size
/// (`0.001` → 3, `1` → 0).
pub fn step_precision(step: f64) -> u32 {
    if !step.is_finite() || step <= 0.0 {
        return 0;
    }
    Decimal::from_f64(step).map(|d| d.normalize().scale()).unwrap_or(0)
}

/// Largest multiple of `step` that does not exceed `value`.
///
/// Done in decimal arithmetic so a quantity a hair under a step boundary
/// stays under it. Returns `value` unchanged when the step is unusable.
pub fn floor_to_step(value: f64, step: f64) -> f64 {
    if !step.is_finite() || step <= 0.0 {
        return value;
    }
    let (Some(v), Some(s)) = (Decimal::from_f64(value), Decimal::from_f64(step)) else {
        return value;
    };
    let floored = v
        .checked_div(s)
        .and_then(|steps| steps.floor().checked_mul(s))
        .map(|d| d.normalize());
    match floored.and_then(|d| d.to_f64()) {
        Some(f) if f <= value => f,
        _ => value,
    }
}

fn lot_size(filters: &[SymbolFilter]) -> Option<(f64, f64, f64)> {
    filters.iter().find_map(|f| match f {
        SymbolFilter::LotSize {
            min_qty,
            max_qty,
            step_size,
        } => Some((*min_qty, *max_qty, *step_size)),
        _ => None,
    })
}

fn price_filter(filters: &[SymbolFilter]) -> Option<(f64, f64, f64)> {
    filters.iter().find_map(|f| match f {
        SymbolFilter::PriceFilter {
            min_price,
            max_price,
            tick_size,
        } => Some((*min_price, *max_price, *tick_size)),
        _ => None,
    })
}

fn min_notional(filters: &[SymbolFilter]) -> Option<f64> {
    filters.iter().find_map(|f| match f {
        SymbolFilter::MinNotional { min_notional } => Some(*min_notional),
        _ => None,
    })
}

pub fn validate(quantity: f64, price: f64, filters: &[SymbolFilter]) -> QuantityValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut details = ValidationDetails {
        original_quantity: quantity,
        original_price: price,
        ..Default::default()
    };
    let mut adjusted_quantity = quantity;
    let mut adjusted_price = price;

    if !quantity.is_finite() || quantity <= 0.0 {
        errors.push(format!("Quantity must be a positive number (got {})", quantity));
    }
    if !price.is_finite() || price <= 0.0 {
        errors.push(format!("Price must be a positive number (got {})", price));
    }
    if !errors.is_empty() {
        return QuantityValidation {
            is_valid: false,
            adjusted_quantity,
            adjusted_price,
            errors,
            warnings,
            details,
        };
    }

    adjusted_quantity = check_lot_size(quantity, filters, &mut details, &mut errors, &mut warnings);

    if let Some((min_price, max_price, tick_size)) = price_filter(filters) {
        details.tick_size = Some(tick_size);
        if tick_size > 0.0 {
            adjusted_price = floor_to_step(price, tick_size);
            if adjusted_price != price {
                warnings.push(format!(
                    "Price adjusted from {} to {} (tick size {})",
                    price, adjusted_price, tick_size
                ));
            }
        }
        // A bound of zero means the venue does not enforce it.
        if min_price > 0.0 && adjusted_price < min_price {
            errors.push(format!("Price {} is below minimum {}", adjusted_price, min_price));
        }
        if max_price > 0.0 && adjusted_price > max_price {
            errors.push(format!("Price {} exceeds maximum {}", adjusted_price, max_price));
        }
    }

    let notional = adjusted_quantity * price;
    details.notional = Some(notional);
    if let Some(min) = min_notional(filters) {
        details.min_notional = Some(min);
        if notional < min {
            errors.push(format!(
                "Order value {:.8} is below MIN_NOTIONAL {}",
                notional, min
            ));
        }
    }

    QuantityValidation {
        is_valid: errors.is_empty(),
        adjusted_quantity,
        adjusted_price,
        errors,
        warnings,
        details,
    }
}

/// LOT_SIZE checks alone, for orders whose notional is not known up front
/// (closing a position when no price is available).
pub fn validate_quantity(quantity: f64, filters: &[SymbolFilter]) -> QuantityValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut details = ValidationDetails {
        original_quantity: quantity,
        ..Default::default()
    };

    let adjusted_quantity = if !quantity.is_finite() || quantity <= 0.0 {
        errors.push(format!("Quantity must be a positive number (got {})", quantity));
        quantity
    } else {
        check_lot_size(quantity, filters, &mut details, &mut errors, &mut warnings)
    };

    QuantityValidation {
        is_valid: errors.is_empty(),
        adjusted_quantity,
        adjusted_price: 0.0,
        errors,
        warnings,
        details,
    }
}

fn check_lot_size(
    quantity: f64,
    filters: &[SymbolFilter],
    details: &mut ValidationDetails,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) -> f64 {
    let Some((min_qty, max_qty, step_size)) = lot_size(filters) else {
        errors.push("LOT_SIZE filter not found".to_string());
        return quantity;
    };

    details.step_size = Some(step_size);
    details.quantity_precision = Some(step_precision(step_size));
    details.min_qty = Some(min_qty);
    details.max_qty = Some(max_qty);

    let adjusted = floor_to_step(quantity, step_size);
    if adjusted != quantity {
        warnings.push(format!(
            "Quantity adjusted from {} to {} (step size {})",
            quantity, adjusted, step_size
        ));
    }

    if adjusted < min_qty {
        errors.push(format!("Quantity {} is below minimum {}", adjusted, min_qty));
    }
    if adjusted > max_qty {
        errors.push(format!("Quantity {} exceeds maximum {}", adjusted, max_qty));
    }
    adjusted
}
