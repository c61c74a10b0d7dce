use crate::broker::BrokerClient;
use crate::engine::EngineError;
use crate::models::{Order, Side};
use crate::notify::Notifier;
use crate::Result;

/// Two prices are "the same order" when they differ by less than 0.05%
/// of the larger magnitude. Changing this materially changes trade
/// frequency.
pub const PRICE_MATCH_TOLERANCE: f64 = 0.0005;

/// What the reconciler decided for one (symbol, side) pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// A fresh order was placed; nothing was resting.
    Placed { order_id: String },
    /// Resting order(s) were cancelled and one new order placed.
    Replaced { cancelled: usize, order_id: String },
    /// The resting order already matches the target; left alone.
    Kept,
    /// This side takes no order in the current anchor state.
    Skipped,
}

/// Compares the computed target against the broker's resting orders and
/// issues the minimal set of cancel/place commands.
pub struct OrderReconciler<'a> {
    broker: &'a dyn BrokerClient,
    notifier: &'a dyn Notifier,
}

impl<'a> OrderReconciler<'a> {
    pub fn new(broker: &'a dyn BrokerClient, notifier: &'a dyn Notifier) -> Self {
        Self { broker, notifier }
    }

    /// The partial-fill guard: any resting order for the symbol (either
    /// side) that is partially executed freezes all reconciliation for
    /// the symbol until a human or the next fill resolves it.
    pub fn find_partial_fill(pending_same_code: &[Order]) -> Option<&Order> {
        pending_same_code.iter().find(|o| o.is_partial_filled())
    }

    /// Reconcile one side of a symbol against its resting orders.
    ///
    /// `pending_same_code` must already be filtered to the symbol (both
    /// sides); the partial-fill guard is the caller's responsibility and
    /// runs once per symbol, before either side.
    pub async fn reconcile_side(
        &self,
        code: &str,
        side: Side,
        anchor_side: Side,
        target_price: f64,
        target_quantity: i64,
        pending_same_code: &[Order],
    ) -> Result<ReconcileOutcome> {
        // Nothing to unwind yet: a sell anchor means the last round-trip
        // closed and no sell order may rest until a new buy fills.
        if side == Side::Sell && anchor_side == Side::Sell {
            tracing::debug!("{} SELL skipped: anchor is a sell", code);
            return Ok(ReconcileOutcome::Skipped);
        }

        let matches: Vec<&Order> = pending_same_code
            .iter()
            .filter(|o| o.side == side)
            .collect();

        match matches.len() {
            0 => {
                let order_id = self.place(code, side, target_quantity, target_price).await?;
                Ok(ReconcileOutcome::Placed { order_id })
            }
            1 => {
                let existing = matches[0];

                if prices_match(existing.price, target_price) {
                    tracing::debug!(
                        "{} {} kept: resting {} within tolerance of target {}",
                        code,
                        side,
                        existing.price,
                        target_price
                    );
                    return Ok(ReconcileOutcome::Kept);
                }

                // A resting order already better than the recomputed
                // target is not downgraded after a sell-anchored ladder.
                if anchor_side == Side::Sell && existing.price > target_price {
                    tracing::debug!(
                        "{} {} kept: resting {} better than target {}",
                        code,
                        side,
                        existing.price,
                        target_price
                    );
                    return Ok(ReconcileOutcome::Kept);
                }

                self.cancel(existing).await?;
                let order_id = self.place(code, side, target_quantity, target_price).await?;
                Ok(ReconcileOutcome::Replaced {
                    cancelled: 1,
                    order_id,
                })
            }
            n => {
                // Duplicate or stale orders: clear them all, then place
                // the single correct one.
                tracing::warn!("{} {}: {} duplicate resting orders, cancelling all", code, side, n);
                for order in &matches {
                    self.cancel(order).await?;
                }
                let order_id = self.place(code, side, target_quantity, target_price).await?;
                Ok(ReconcileOutcome::Replaced {
                    cancelled: n,
                    order_id,
                })
            }
        }
    }

    async fn place(&self, code: &str, side: Side, quantity: i64, price: f64) -> Result<String> {
        let result = self.broker.place_order(side, code, quantity, price).await?;
        if result.is_err() {
            return Err(EngineError::Broker {
                op: "place",
                code: code.to_string(),
                error_code: result.error_code,
                message: result.message,
            }
            .into());
        }

        let order_id = result.order_id.unwrap_or_default();
        tracing::info!("Placed {} {} x {} @ {} ({})", side, code, quantity, price, order_id);
        self.notifier
            .send_message(&format!(
                "Placed {} {} x {} @ {}",
                side, code, quantity, price
            ))
            .await;

        Ok(order_id)
    }

    async fn cancel(&self, order: &Order) -> Result<()> {
        let result = self.broker.cancel_order(&order.order_id, &order.code).await?;
        if result.is_err() {
            return Err(EngineError::Broker {
                op: "cancel",
                code: order.code.clone(),
                error_code: result.error_code,
                message: result.message,
            }
            .into());
        }

        tracing::info!(
            "Cancelled {} {} x {} @ {} ({})",
            order.side,
            order.code,
            order.quantity,
            order.price,
            order.order_id
        );
        self.notifier
            .send_message(&format!(
                "Cancelled {} {} resting @ {}",
                order.side, order.code, order.price
            ))
            .await;

        Ok(())
    }
}

fn prices_match(existing: f64, target: f64) -> bool {
    (existing - target).abs() <= existing.abs().max(target.abs()) * PRICE_MATCH_TOLERANCE
}
