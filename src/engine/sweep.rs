use std::sync::Arc;

use crate::broker::BrokerClient;
use crate::db::{HoldingHistory, VolatilityStore};
use crate::engine::price_band::TickTable;
use crate::engine::processor::{SymbolOutcome, SymbolProcessor};
use crate::engine::reconciler::ReconcileOutcome;
use crate::models::{AlgoConfig, Fund, Market};
use crate::notify::Notifier;
use crate::quotes::ForeignQuoteService;

/// One fund paired with its own broker connection.
///
/// Broker connections are not assumed safe for concurrent requests, so
/// the sweep runs each connection in its own task and keeps the fund's
/// symbols strictly sequential inside it.
#[derive(Clone)]
pub struct FundConnection {
    pub fund: Fund,
    pub broker: Arc<dyn BrokerClient>,
}

/// Collaborators shared across all fund sweeps; these own their own
/// consistency guarantees.
pub struct SweepDeps {
    pub volatility: Arc<dyn VolatilityStore>,
    pub history: Arc<dyn HoldingHistory>,
    pub foreign_quotes: Arc<dyn ForeignQuoteService>,
    pub notifier: Arc<dyn Notifier>,
    pub tick_table: TickTable,
}

/// Tally of one market tick across all funds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub funds: usize,
    pub symbols: usize,
    pub orders_placed: usize,
    pub orders_replaced: usize,
    pub orders_kept: usize,
    pub sides_skipped: usize,
    pub no_anchor: usize,
    pub guarded: usize,
    pub errors: usize,
}

impl SweepSummary {
    fn absorb_outcome(&mut self, outcome: &SymbolOutcome) {
        match outcome {
            SymbolOutcome::NoAnchor => self.no_anchor += 1,
            SymbolOutcome::Guarded => self.guarded += 1,
            SymbolOutcome::Reconciled { buy, sell } => {
                for side in [buy, sell] {
                    match side {
                        ReconcileOutcome::Placed { .. } => self.orders_placed += 1,
                        ReconcileOutcome::Replaced { .. } => self.orders_replaced += 1,
                        ReconcileOutcome::Kept => self.orders_kept += 1,
                        ReconcileOutcome::Skipped => self.sides_skipped += 1,
                    }
                }
            }
        }
    }

    fn merge(&mut self, other: SweepSummary) {
        self.funds += other.funds;
        self.symbols += other.symbols;
        self.orders_placed += other.orders_placed;
        self.orders_replaced += other.orders_replaced;
        self.orders_kept += other.orders_kept;
        self.sides_skipped += other.sides_skipped;
        self.no_anchor += other.no_anchor;
        self.guarded += other.guarded;
        self.errors += other.errors;
    }
}

/// Run one tick for a market: every fund sweeps concurrently, each on its
/// own connection. Per-symbol failures are logged and alerted, then the
/// sweep moves on; nothing here halts the process.
pub async fn run_market_tick(
    connections: Vec<FundConnection>,
    market: Market,
    deps: Arc<SweepDeps>,
) -> SweepSummary {
    let mut handles = Vec::with_capacity(connections.len());

    for connection in connections {
        let deps = Arc::clone(&deps);
        handles.push(tokio::spawn(async move {
            sweep_fund(connection, market, deps).await
        }));
    }

    let mut total = SweepSummary::default();
    for handle in handles {
        match handle.await {
            Ok(summary) => total.merge(summary),
            Err(err) => {
                tracing::error!("Fund sweep task failed: {}", err);
                total.errors += 1;
            }
        }
    }

    tracing::info!(
        "Tick done for {}: {} funds, {} symbols, {} placed, {} replaced, {} kept, {} guarded, {} errors",
        market,
        total.funds,
        total.symbols,
        total.orders_placed,
        total.orders_replaced,
        total.orders_kept,
        total.guarded,
        total.errors
    );

    total
}

async fn sweep_fund(
    connection: FundConnection,
    market: Market,
    deps: Arc<SweepDeps>,
) -> SweepSummary {
    let FundConnection { fund, broker } = connection;

    let processor = SymbolProcessor::new(
        broker.as_ref(),
        deps.volatility.as_ref(),
        deps.history.as_ref(),
        deps.foreign_quotes.as_ref(),
        deps.notifier.as_ref(),
        &deps.tick_table,
    );

    // Deterministic sweep order within the fund.
    let mut configs: Vec<&AlgoConfig> = fund
        .algo_configs
        .values()
        .filter(|c| c.market == market)
        .collect();
    configs.sort_by(|a, b| a.code.cmp(&b.code));

    let mut summary = SweepSummary {
        funds: 1,
        ..Default::default()
    };

    for algo in configs {
        summary.symbols += 1;

        match processor.process_symbol(&fund, algo).await {
            Ok(outcome) => {
                summary.absorb_outcome(&outcome);
            }
            Err(err) => {
                tracing::error!("{} [{}]: {}", algo.code, fund.name, err);
                deps.notifier
                    .send_message(&format!("{} [{}] failed: {}", algo.code, fund.name, err))
                    .await;
                summary.errors += 1;
            }
        }
    }

    summary
}
