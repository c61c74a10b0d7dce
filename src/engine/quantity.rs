use crate::engine::EngineError;
use crate::models::AlgoConfig;

/// Resolve the quantity for the next buy order.
///
/// Priority: explicit fixed quantity, then dynamic sizing from the target
/// gross amount, then the anchor execution's own quantity.
pub fn resolve_buy_quantity(
    config: &AlgoConfig,
    anchor_quantity: i64,
    market_price: f64,
) -> Result<i64, EngineError> {
    if market_price <= 0.0 {
        return Err(EngineError::InvalidQuote {
            code: config.code.clone(),
            price: market_price,
        });
    }

    if config.fixed_quantity > 0 {
        return Ok(config.fixed_quantity);
    }

    if let Some(target_gross) = config.target_gross_amount {
        return Ok((target_gross / market_price).round() as i64);
    }

    Ok(anchor_quantity)
}

/// Sell quantity always mirrors the anchor execution: the position being
/// unwound.
pub fn resolve_sell_quantity(anchor_quantity: i64) -> i64 {
    anchor_quantity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Market;

    fn config(fixed_quantity: i64, target_gross_amount: Option<f64>) -> AlgoConfig {
        AlgoConfig {
            code: "005930".to_string(),
            market: Market::Krx,
            fixed_quantity,
            pinned_base_price: None,
            std_dev_range: 20,
            std_dev_multiplier: 0.95,
            target_gross_amount,
        }
    }

    #[test]
    fn test_fixed_quantity_wins_over_anchor() {
        let quantity = resolve_buy_quantity(&config(2500, None), 4000, 20.0).unwrap();
        assert_eq!(quantity, 2500);

        // Fixed quantity also wins over dynamic sizing
        let quantity = resolve_buy_quantity(&config(2500, Some(1000.0)), 4000, 20.0).unwrap();
        assert_eq!(quantity, 2500);
    }

    #[test]
    fn test_target_gross_amount_sizing() {
        // 1000 / 20 = 50 shares
        let quantity = resolve_buy_quantity(&config(0, Some(1000.0)), 2500, 20.0).unwrap();
        assert_eq!(quantity, 50);

        // Rounds to nearest: 1000 / 30 = 33.33 -> 33
        let quantity = resolve_buy_quantity(&config(0, Some(1000.0)), 2500, 30.0).unwrap();
        assert_eq!(quantity, 33);
    }

    #[test]
    fn test_falls_back_to_anchor_quantity() {
        let quantity = resolve_buy_quantity(&config(0, None), 2500, 20.0).unwrap();
        assert_eq!(quantity, 2500);
    }

    #[test]
    fn test_invalid_market_price_fails_fast() {
        let result = resolve_buy_quantity(&config(2500, None), 4000, 0.0);
        assert!(matches!(result, Err(EngineError::InvalidQuote { .. })));

        let result = resolve_buy_quantity(&config(0, Some(1000.0)), 4000, -1.0);
        assert!(matches!(result, Err(EngineError::InvalidQuote { .. })));
    }

    #[test]
    fn test_sell_quantity_mirrors_anchor() {
        assert_eq!(resolve_sell_quantity(4000), 4000);
        assert_eq!(resolve_sell_quantity(1), 1);
    }
}
