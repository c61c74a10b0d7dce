// End-to-end sweeps over the paper broker: seeded history and volatility
// in, broker commands and alerts out.

use bandbot::broker::{ConnectionConfig, PaperBroker};
use bandbot::db::{MemoryHoldingHistory, MemoryVolatilityStore};
use bandbot::engine::{
    run_market_tick, FundConnection, ReconcileOutcome, SweepDeps, SymbolOutcome, SymbolProcessor,
    TickTable,
};
use bandbot::models::{AlgoConfig, Fund, HoldingStock, Market, Order, Side};
use bandbot::notify::RecordingNotifier;
use bandbot::quotes::StaticQuoteService;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

const USER: Uuid = Uuid::from_u128(42);
const CODE: &str = "005930";

struct Harness {
    broker: PaperBroker,
    volatility: MemoryVolatilityStore,
    history: MemoryHoldingHistory,
    foreign_quotes: StaticQuoteService,
    notifier: RecordingNotifier,
    tick_table: TickTable,
    fund: Fund,
    algo: AlgoConfig,
}

impl Harness {
    /// Fund holding 4000 shares bought at 20.0 yesterday, trailing std dev
    /// 1.35 with multiplier 0.95, market at 40.0, tick size 0.02. Band
    /// targets work out to BUY 19.74 and SELL 20.26.
    fn new() -> Self {
        let broker = PaperBroker::new(ConnectionConfig {
            account_id: "e2e".to_string(),
            native_market: Market::Krx,
        });
        broker.set_quote(CODE, 40.0);

        let volatility = MemoryVolatilityStore::new();
        volatility.set_std_dev(CODE, 20, 1.35);

        let history = MemoryHoldingHistory::new();
        history.insert(HoldingStock {
            code: CODE.to_string(),
            side: Side::Buy,
            quantity: 4000,
            gross: 80_000.0,
            date: Utc::now() - Duration::days(1),
            user_id: USER,
            fund_name: "growth".to_string(),
            index_snapshot: None,
            fill_ids: "FILL-1".to_string(),
        });

        let mut fund = Fund::new(USER, "growth");
        let algo = AlgoConfig {
            code: CODE.to_string(),
            market: Market::Krx,
            fixed_quantity: 2500,
            pinned_base_price: None,
            std_dev_range: 20,
            std_dev_multiplier: 0.95,
            target_gross_amount: None,
        };
        fund.insert_algo_config(algo.clone());

        Self {
            broker,
            volatility,
            history,
            foreign_quotes: StaticQuoteService::new(),
            notifier: RecordingNotifier::new(),
            tick_table: TickTable::default().with_tick(CODE, 0.02),
            fund,
            algo,
        }
    }

    fn processor(&self) -> SymbolProcessor<'_> {
        SymbolProcessor::new(
            &self.broker,
            &self.volatility,
            &self.history,
            &self.foreign_quotes,
            &self.notifier,
            &self.tick_table,
        )
    }

    fn resting(&self, side: Side, price: f64, order_id: &str) -> Order {
        Order {
            code: CODE.to_string(),
            side,
            quantity: 2500,
            price,
            order_id: order_id.to_string(),
            filled_quantity: 0,
            filled_average_price: 0.0,
            created_at: Utc::now(),
        }
    }
}

#[tokio::test]
async fn fresh_symbol_gets_both_band_orders() {
    let h = Harness::new();

    let outcome = h
        .processor()
        .process_symbol(&h.fund, &h.algo)
        .await
        .unwrap();

    let SymbolOutcome::Reconciled { buy, sell } = outcome else {
        panic!("expected reconciliation, got {:?}", outcome);
    };
    assert!(matches!(buy, ReconcileOutcome::Placed { .. }));
    assert!(matches!(sell, ReconcileOutcome::Placed { .. }));

    let placed = h.broker.placed_orders();
    assert_eq!(placed.len(), 2);

    assert_eq!(placed[0].side, Side::Buy);
    assert_eq!(placed[0].price, 19.74);
    assert_eq!(placed[0].quantity, 2500);

    assert_eq!(placed[1].side, Side::Sell);
    assert_eq!(placed[1].price, 20.26);
    assert_eq!(placed[1].quantity, 4000);

    // One placement alert per order
    let messages = h.notifier.messages();
    assert_eq!(
        messages
            .iter()
            .filter(|m| m.contains("Placed BUY 005930"))
            .count(),
        1
    );
    assert_eq!(
        messages
            .iter()
            .filter(|m| m.contains("Placed SELL 005930"))
            .count(),
        1
    );
}

#[tokio::test]
async fn second_tick_keeps_orders_in_place() {
    let h = Harness::new();

    h.processor()
        .process_symbol(&h.fund, &h.algo)
        .await
        .unwrap();
    let outcome = h
        .processor()
        .process_symbol(&h.fund, &h.algo)
        .await
        .unwrap();

    // Same inputs recompute the same targets, so the resting orders stand.
    assert_eq!(
        outcome,
        SymbolOutcome::Reconciled {
            buy: ReconcileOutcome::Kept,
            sell: ReconcileOutcome::Kept,
        }
    );
    assert_eq!(h.broker.placed_orders().len(), 2);
    assert!(h.broker.cancelled_order_ids().is_empty());
}

#[tokio::test]
async fn duplicate_resting_buys_are_cleared_then_replaced() {
    let h = Harness::new();
    h.broker.seed_pending(h.resting(Side::Buy, 21.0, "STALE-1"));
    h.broker.seed_pending(h.resting(Side::Buy, 20.5, "STALE-2"));

    let outcome = h
        .processor()
        .process_symbol(&h.fund, &h.algo)
        .await
        .unwrap();

    let SymbolOutcome::Reconciled { buy, .. } = outcome else {
        panic!("expected reconciliation");
    };
    assert!(matches!(buy, ReconcileOutcome::Replaced { cancelled: 2, .. }));

    assert_eq!(h.broker.cancelled_order_ids(), vec!["STALE-1", "STALE-2"]);

    let buys: Vec<Order> = h
        .broker
        .pending_snapshot()
        .into_iter()
        .filter(|o| o.side == Side::Buy)
        .collect();
    assert_eq!(buys.len(), 1);
    assert_eq!(buys[0].price, 19.74);
}

#[tokio::test]
async fn partial_fill_freezes_the_symbol() {
    let h = Harness::new();
    let mut order = h.resting(Side::Buy, 19.8, "HALF-1");
    order.filled_quantity = 120;
    order.filled_average_price = 19.8;
    h.broker.seed_pending(order);

    let outcome = h
        .processor()
        .process_symbol(&h.fund, &h.algo)
        .await
        .unwrap();

    assert_eq!(outcome, SymbolOutcome::Guarded);
    assert!(h.broker.placed_orders().is_empty());
    assert!(h.broker.cancelled_order_ids().is_empty());

    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Partial fill"));
}

#[tokio::test]
async fn market_tick_runs_the_fund_through_the_sweep() {
    let h = Harness::new();
    let notifier = Arc::new(RecordingNotifier::new());

    let broker = Arc::new(PaperBroker::new(ConnectionConfig {
        account_id: "e2e".to_string(),
        native_market: Market::Krx,
    }));
    broker.set_quote(CODE, 40.0);

    let deps = Arc::new(SweepDeps {
        volatility: Arc::new(h.volatility),
        history: Arc::new(h.history),
        foreign_quotes: Arc::new(StaticQuoteService::new()),
        notifier,
        tick_table: h.tick_table,
    });

    let summary = run_market_tick(
        vec![FundConnection {
            fund: h.fund,
            broker: broker.clone(),
        }],
        Market::Krx,
        deps,
    )
    .await;

    assert_eq!(summary.funds, 1);
    assert_eq!(summary.symbols, 1);
    assert_eq!(summary.orders_placed, 2);
    assert_eq!(summary.errors, 0);
    assert_eq!(broker.placed_orders().len(), 2);
}
