use chrono::Utc;

use crate::broker::BrokerClient;
use crate::db::{HoldingHistory, VolatilityStore};
use crate::engine::base_execution::{assemble_side, find_base_execution};
use crate::engine::price_band::{target_price, TickTable};
use crate::engine::quantity::{resolve_buy_quantity, resolve_sell_quantity};
use crate::engine::reconciler::{OrderReconciler, ReconcileOutcome};
use crate::engine::EngineError;
use crate::models::{AlgoConfig, Execution, Fund, Order, Side};
use crate::notify::Notifier;
use crate::quotes::ForeignQuoteService;
use crate::Result;

/// How one symbol's tick ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    /// No open position and no unmatched round-trip: nothing to anchor on.
    NoAnchor,
    /// A partial fill froze the symbol for this tick.
    Guarded,
    /// Both sides were reconciled against the broker.
    Reconciled {
        buy: ReconcileOutcome,
        sell: ReconcileOutcome,
    },
}

/// Per-(fund, symbol) decision pipeline.
///
/// Stateless across invocations: every tick recomputes from the broker's
/// order book and the execution history, so a failure mid-symbol simply
/// stops further action until the next tick starts fresh.
pub struct SymbolProcessor<'a> {
    broker: &'a dyn BrokerClient,
    volatility: &'a dyn VolatilityStore,
    history: &'a dyn HoldingHistory,
    foreign_quotes: &'a dyn ForeignQuoteService,
    notifier: &'a dyn Notifier,
    tick_table: &'a TickTable,
}

impl<'a> SymbolProcessor<'a> {
    pub fn new(
        broker: &'a dyn BrokerClient,
        volatility: &'a dyn VolatilityStore,
        history: &'a dyn HoldingHistory,
        foreign_quotes: &'a dyn ForeignQuoteService,
        notifier: &'a dyn Notifier,
        tick_table: &'a TickTable,
    ) -> Self {
        Self {
            broker,
            volatility,
            history,
            foreign_quotes,
            notifier,
            tick_table,
        }
    }

    /// Run the full pipeline for one symbol of one fund: volatility →
    /// quote → anchor → pending-order reconciliation for both sides.
    pub async fn process_symbol(
        &self,
        fund: &Fund,
        algo: &AlgoConfig,
    ) -> Result<SymbolOutcome> {
        let code = &algo.code;

        let std_dev = self
            .volatility
            .find_latest_std_dev(code, algo.std_dev_range)
            .await?
            .ok_or_else(|| EngineError::MissingVolatility {
                code: code.clone(),
                range: algo.std_dev_range,
            })?;

        let quote = if algo.market.is_foreign_for(self.broker.native_market()) {
            self.foreign_quotes.get_realtime_quote(code).await?
        } else {
            self.broker.get_stock_quote(code).await?
        };
        if quote.price <= 0.0 {
            return Err(EngineError::InvalidQuote {
                code: code.clone(),
                price: quote.price,
            }
            .into());
        }

        let today: Vec<Execution> = self
            .broker
            .get_stock_today_executions(algo.market)
            .await?
            .into_values()
            .filter(|e| e.code == *code)
            .collect();

        // Historical anchors come from closed transactions of previous
        // days; today's picture is the broker's alone.
        let today_date = Utc::now().date_naive();
        let historical: Vec<Execution> = self
            .history
            .find_by_user(fund.user_id)
            .await?
            .iter()
            .filter(|h| h.code == *code && h.date.date_naive() < today_date)
            .map(|h| h.to_execution(algo.market))
            .collect();

        let buys = assemble_side(&historical, &today, Side::Buy);
        let sells = assemble_side(&historical, &today, Side::Sell);

        let anchor = match find_base_execution(buys, sells)? {
            Some(anchor) => anchor,
            None => {
                tracing::info!("{} [{}]: no anchor execution, skipping", code, fund.name);
                return Ok(SymbolOutcome::NoAnchor);
            }
        };
        tracing::debug!(
            "{} [{}]: anchor {} {} x {} @ {}",
            code,
            fund.name,
            anchor.side,
            code,
            anchor.quantity,
            anchor.price
        );

        let pending: Vec<Order> = self
            .broker
            .get_pending_orders(algo.market)
            .await?
            .into_iter()
            .filter(|o| o.code == *code)
            .collect();

        if let Some(partial) = OrderReconciler::find_partial_fill(&pending) {
            tracing::warn!(
                "{} [{}]: partial fill on {} ({}/{} filled), holding off this tick",
                code,
                fund.name,
                partial.order_id,
                partial.filled_quantity,
                partial.quantity
            );
            self.notifier
                .send_message(&format!(
                    "Partial fill on {} {} ({}/{} filled); no action this tick",
                    partial.side, code, partial.filled_quantity, partial.quantity
                ))
                .await;
            return Ok(SymbolOutcome::Guarded);
        }

        let reconciler = OrderReconciler::new(self.broker, self.notifier);
        let tick = self.tick_table.tick_for(code);

        let buy_quantity = resolve_buy_quantity(algo, anchor.quantity, quote.price)?;
        let buy_price = target_price(
            Side::Buy,
            &anchor,
            std_dev,
            algo.std_dev_multiplier,
            quote.price,
            tick,
        )?;
        let buy = reconciler
            .reconcile_side(code, Side::Buy, anchor.side, buy_price, buy_quantity, &pending)
            .await?;

        let sell_quantity = resolve_sell_quantity(anchor.quantity);
        let sell_price = target_price(
            Side::Sell,
            &anchor,
            std_dev,
            algo.std_dev_multiplier,
            quote.price,
            tick,
        )?;
        let sell = reconciler
            .reconcile_side(
                code,
                Side::Sell,
                anchor.side,
                sell_price,
                sell_quantity,
                &pending,
            )
            .await?;

        Ok(SymbolOutcome::Reconciled { buy, sell })
    }
}
