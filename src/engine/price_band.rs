use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::engine::EngineError;
use crate::models::{Execution, Side};

/// Upper bound on the band adjustment, however wild the trailing std
/// dev gets. 2.618% of the anchor price.
pub const MAX_ADJUST_PCT: f64 = 0.02618;

/// Symbol-specific minimum price increments
///
/// Brokers reject limit prices off the tick grid, so every computed band
/// price gets snapped to the symbol's tick before placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickTable {
    ticks: HashMap<String, f64>,
    default_tick: f64,
}

impl Default for TickTable {
    fn default() -> Self {
        Self {
            ticks: HashMap::new(),
            default_tick: 0.01,
        }
    }
}

impl TickTable {
    pub fn with_tick(mut self, code: impl Into<String>, tick: f64) -> Self {
        self.ticks.insert(code.into(), tick);
        self
    }

    pub fn tick_for(&self, code: &str) -> f64 {
        self.ticks.get(code).copied().unwrap_or(self.default_tick)
    }
}

/// Compute the tick-rounded limit price for the next order on `side`.
///
/// Pure function: identical inputs always produce the identical rounded
/// price. Buys ladder below the anchor, sells above it, scaled by the
/// capped volatility adjustment. Buy targets are additionally clamped
/// against the live market price so a stale anchor cannot bid through
/// the market.
pub fn target_price(
    side: Side,
    anchor: &Execution,
    std_dev: f64,
    std_dev_multiplier: f64,
    market_price: f64,
    tick_size: f64,
) -> Result<f64, EngineError> {
    let adj_pct = (std_dev * std_dev_multiplier / 100.0).min(MAX_ADJUST_PCT);
    if adj_pct <= 0.0 {
        return Err(EngineError::InvalidVolatility {
            code: anchor.code.clone(),
            adj_pct,
        });
    }
    if market_price <= 0.0 {
        return Err(EngineError::InvalidQuote {
            code: anchor.code.clone(),
            price: market_price,
        });
    }

    let mut target = match side {
        Side::Sell => anchor.price * (1.0 + adj_pct),
        Side::Buy => anchor.price / (1.0 + adj_pct),
    };

    if side == Side::Buy {
        match anchor.side {
            // A stale-low buy anchor must not bid above the live market.
            Side::Buy => {
                while target > market_price {
                    target /= 1.0 + adj_pct / 2.0;
                }
            }
            // After a sell-anchored ladder, don't bid too far under market.
            Side::Sell => {
                let floor = market_price / (1.0 + std_dev / 100.0);
                while target < floor {
                    target *= 1.0 + adj_pct / 2.0;
                }
            }
        }
    }

    let ticks = target / tick_size;
    let rounded = match side {
        Side::Buy => ticks.floor() * tick_size,
        Side::Sell => ticks.ceil() * tick_size,
    };

    Ok((rounded * 1000.0).round() / 1000.0)
}
