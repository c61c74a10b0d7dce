use crate::engine::EngineError;
use crate::models::{Execution, Side};

/// Sort a side's executions for anchor resolution: ascending by price,
/// ties broken by descending time (most recent first).
pub fn sort_for_resolution(executions: &mut [Execution]) {
    executions.sort_by(|a, b| {
        a.price
            .total_cmp(&b.price)
            .then_with(|| b.time.cmp(&a.time))
    });
}

/// Merge historical executions with the day's order-merged executions,
/// keep one side, and sort for [`find_base_execution`].
pub fn assemble_side(historical: &[Execution], today: &[Execution], side: Side) -> Vec<Execution> {
    let mut merged: Vec<Execution> = historical
        .iter()
        .chain(today.iter())
        .filter(|e| e.side == side)
        .cloned()
        .collect();
    sort_for_resolution(&mut merged);
    merged
}

/// Find the anchor ("base") execution for the next band.
///
/// The strategy ladders buys downward and sells upward from a moving
/// anchor; completed round-trips are paired off chronologically so the
/// oldest still-open position surfaces as the new anchor. Both inputs
/// must be sorted by [`sort_for_resolution`].
///
/// Recursion operates on shrinking owned copies of the lists, with the
/// matched pair removed at each step.
pub fn find_base_execution(
    buys: Vec<Execution>,
    sells: Vec<Execution>,
) -> Result<Option<Execution>, EngineError> {
    if buys.is_empty() && sells.is_empty() {
        return Ok(None);
    }

    // No sells: the lowest-priced buy is the open position.
    if sells.is_empty() {
        return Ok(buys.into_iter().next());
    }

    // No buys left: a single remaining sell is the terminal anchor,
    // anything else is undecidable.
    if buys.is_empty() {
        if sells.len() == 1 {
            return Ok(sells.into_iter().next());
        }
        return Ok(None);
    }

    let sell = sells[0].clone();

    for buy_index in 0..buys.len() {
        let buy = &buys[buy_index];

        if sell.price <= buy.price {
            // A sell resting at or below an open buy without having
            // closed it: the history cannot be trusted.
            tracing::error!(
                code = %sell.code,
                sell_price = sell.price,
                sell_time = %sell.time,
                buy_price = buy.price,
                buy_time = %buy.time,
                "Sell priced at or below an unclosed buy; refusing to pick an anchor"
            );
            return Err(EngineError::InconsistentHistory {
                code: sell.code.clone(),
                sell_price: sell.price,
                buy_price: buy.price,
            });
        }

        if sell.time > buy.time {
            // This sell closed out that earlier buy: drop the round-trip
            // and resolve the remainder.
            let mut remaining_buys = buys.clone();
            remaining_buys.remove(buy_index);
            let mut remaining_sells = sells.clone();
            remaining_sells.remove(0);

            if remaining_buys.is_empty() && remaining_sells.is_empty() {
                return Ok(Some(sell));
            }
            return find_base_execution(remaining_buys, remaining_sells);
        }

        // The sell predates this buy, so it cannot have closed it; try
        // the next buy up the ladder.
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetClass, Market};
    use chrono::{TimeZone, Utc};

    fn execution(side: Side, price: f64, quantity: i64, hour: u32) -> Execution {
        Execution {
            code: "005930".to_string(),
            side,
            quantity,
            price,
            time: Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap(),
            order_id: format!("{}-{}-{}", side, price, hour),
            fill_ids: format!("F-{}-{}", price, hour),
            commission: 0.0,
            market: Market::Krx,
            asset_class: AssetClass::Equity,
        }
    }

    fn sorted(mut list: Vec<Execution>) -> Vec<Execution> {
        sort_for_resolution(&mut list);
        list
    }

    #[test]
    fn test_both_empty_yields_none() {
        assert!(find_base_execution(vec![], vec![]).unwrap().is_none());
    }

    #[test]
    fn test_single_buy_is_its_own_anchor() {
        let buys = vec![execution(Side::Buy, 20.0, 4000, 9)];
        let anchor = find_base_execution(buys, vec![]).unwrap().unwrap();
        assert_eq!(anchor.price, 20.0);
        assert_eq!(anchor.quantity, 4000);
    }

    #[test]
    fn test_lowest_buy_wins_without_sells() {
        let buys = sorted(vec![
            execution(Side::Buy, 22.0, 100, 9),
            execution(Side::Buy, 20.0, 100, 10),
            execution(Side::Buy, 21.0, 100, 11),
        ]);
        let anchor = find_base_execution(buys, vec![]).unwrap().unwrap();
        assert_eq!(anchor.price, 20.0);
    }

    #[test]
    fn test_later_sell_becomes_terminal_anchor() {
        // BUY@20 closed by a later SELL@22: the sell is the new anchor.
        let buys = vec![execution(Side::Buy, 20.0, 4000, 9)];
        let sells = vec![execution(Side::Sell, 22.0, 4000, 14)];

        let anchor = find_base_execution(buys, sells).unwrap().unwrap();
        assert_eq!(anchor.price, 22.0);
        assert_eq!(anchor.side, Side::Sell);
    }

    #[test]
    fn test_surviving_buy_after_pairing() {
        // Three buys, two later sells: two round-trips pair off and the
        // highest buy survives as the anchor.
        let buys = sorted(vec![
            execution(Side::Buy, 18.0, 100, 9),
            execution(Side::Buy, 19.0, 100, 10),
            execution(Side::Buy, 20.0, 100, 11),
        ]);
        let sells = sorted(vec![
            execution(Side::Sell, 21.0, 100, 13),
            execution(Side::Sell, 22.0, 100, 14),
        ]);

        let anchor = find_base_execution(buys, sells).unwrap().unwrap();
        assert_eq!(anchor.side, Side::Buy);
        assert_eq!(anchor.price, 20.0);
    }

    #[test]
    fn test_sell_predating_buy_skips_to_next_buy() {
        // The sell happened before the cheaper buy, so it must have closed
        // the more expensive earlier buy instead.
        let buys = sorted(vec![
            execution(Side::Buy, 18.0, 100, 12), // after the sell
            execution(Side::Buy, 19.0, 100, 9),  // before the sell
        ]);
        let sells = vec![execution(Side::Sell, 21.0, 100, 10)];

        let anchor = find_base_execution(buys, sells).unwrap().unwrap();
        assert_eq!(anchor.side, Side::Buy);
        assert_eq!(anchor.price, 18.0);
    }

    #[test]
    fn test_inconsistent_history_is_an_error() {
        // A sell resting below an open buy without having closed it.
        let buys = vec![execution(Side::Buy, 20.0, 100, 9)];
        let sells = vec![execution(Side::Sell, 19.0, 100, 14)];

        let result = find_base_execution(buys, sells);
        assert!(matches!(
            result,
            Err(EngineError::InconsistentHistory { .. })
        ));
    }

    #[test]
    fn test_multiple_orphan_sells_yield_none() {
        let sells = sorted(vec![
            execution(Side::Sell, 21.0, 100, 13),
            execution(Side::Sell, 22.0, 100, 14),
        ]);
        assert!(find_base_execution(vec![], sells).unwrap().is_none());
    }

    #[test]
    fn test_determinism() {
        let buys = sorted(vec![
            execution(Side::Buy, 18.0, 100, 9),
            execution(Side::Buy, 19.0, 100, 10),
        ]);
        let sells = vec![execution(Side::Sell, 21.0, 100, 13)];

        let first = find_base_execution(buys.clone(), sells.clone())
            .unwrap()
            .unwrap();
        let second = find_base_execution(buys, sells).unwrap().unwrap();
        assert_eq!(first.order_id, second.order_id);
        assert_eq!(first.price, second.price);
    }

    #[test]
    fn test_assemble_side_merges_and_sorts() {
        let historical = vec![
            execution(Side::Buy, 21.0, 100, 9),
            execution(Side::Sell, 25.0, 100, 10),
        ];
        let today = vec![execution(Side::Buy, 19.0, 100, 11)];

        let buys = assemble_side(&historical, &today, Side::Buy);
        assert_eq!(buys.len(), 2);
        assert_eq!(buys[0].price, 19.0);
        assert_eq!(buys[1].price, 21.0);

        let sells = assemble_side(&historical, &today, Side::Sell);
        assert_eq!(sells.len(), 1);
    }

    #[test]
    fn test_price_tie_prefers_most_recent() {
        let mut buys = vec![
            execution(Side::Buy, 20.0, 100, 9),
            execution(Side::Buy, 20.0, 200, 14),
        ];
        sort_for_resolution(&mut buys);
        assert_eq!(buys[0].quantity, 200);
    }
}
