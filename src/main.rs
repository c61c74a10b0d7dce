use bandbot::broker::{ConnectionConfig, PaperBroker};
use bandbot::db::{
    HoldingHistory, MemoryHoldingHistory, MemoryVolatilityStore, PostgresStore, VolatilityStore,
};
use bandbot::engine::{run_market_tick, FundConnection, SweepDeps, TickTable};
use bandbot::models::{AlgoConfig, Fund, HoldingStock, Market, Side};
use bandbot::notify::{Notifier, TracingNotifier, WebhookNotifier};
use bandbot::quotes::{ForeignQuoteService, HttpQuoteClient, StaticQuoteService};
use bandbot::Result;
use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use uuid::Uuid;

/// Band-trading order management engine.
///
/// Runs the reconciliation sweep against a paper broker. Volatility and
/// holding history come from Postgres when DATABASE_URL is set, otherwise
/// from in-memory stores seeded via BANDBOT_* variables.
#[derive(Parser)]
#[command(name = "bandbot")]
struct Cli {
    /// Market to sweep (KRX, NASDAQ, NYSE, AMEX)
    #[arg(long, default_value = "KRX")]
    market: String,

    /// Seconds between sweep ticks
    #[arg(long, default_value_t = 300)]
    interval_secs: u64,

    /// Run a single tick and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let market: Market = cli.market.parse()?;

    tracing::info!("🚀 BandBot starting - market {}", market);

    let notifier = create_notifier();
    let (volatility, history) = connect_stores().await;
    let foreign_quotes = create_foreign_quote_service();

    let (fund, broker) = build_paper_fund(market);

    let deps = Arc::new(SweepDeps {
        volatility,
        history,
        foreign_quotes,
        notifier,
        tick_table: TickTable::default(),
    });

    let connection = FundConnection {
        fund,
        broker: broker.clone(),
    };

    let mut ticker = interval(Duration::from_secs(cli.interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("⚠️  Received Ctrl+C, shutting down...");
                break;
            }
            _ = ticker.tick() => {
                let summary =
                    run_market_tick(vec![connection.clone()], market, Arc::clone(&deps)).await;

                tracing::info!(
                    "📊 Open paper orders after tick: {}",
                    broker.pending_snapshot().len()
                );

                if cli.once {
                    tracing::info!(
                        "Single tick requested: {} placed, {} errors",
                        summary.orders_placed,
                        summary.errors
                    );
                    break;
                }
            }
        }
    }

    tracing::info!("👋 BandBot stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bandbot=info".into()),
        )
        .init();
}

fn create_notifier() -> Arc<dyn Notifier> {
    match WebhookNotifier::from_env() {
        Some(webhook) => {
            tracing::info!("Webhook alerting enabled");
            Arc::new(webhook)
        }
        None => {
            tracing::info!("BANDBOT_WEBHOOK_URL not set, alerts go to the log only");
            Arc::new(TracingNotifier)
        }
    }
}

async fn connect_stores() -> (Arc<dyn VolatilityStore>, Arc<dyn HoldingHistory>) {
    if let Ok(database_url) = std::env::var("DATABASE_URL") {
        match PostgresStore::new(&database_url).await {
            Ok(store) => {
                tracing::info!("Postgres stores enabled at {}", database_url);
                let store = Arc::new(store);
                let volatility: Arc<dyn VolatilityStore> = store.clone();
                let history: Arc<dyn HoldingHistory> = store;
                return (volatility, history);
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to connect to Postgres ({}), falling back to seeded memory stores",
                    e
                );
            }
        }
    }

    let volatility: Arc<dyn VolatilityStore> = Arc::new(seeded_volatility_store());
    let history: Arc<dyn HoldingHistory> = Arc::new(seeded_holding_history());
    (volatility, history)
}

fn create_foreign_quote_service() -> Arc<dyn ForeignQuoteService> {
    match HttpQuoteClient::from_env() {
        Some(client) => {
            tracing::info!("Foreign quotes served over HTTP");
            Arc::new(client)
        }
        None => {
            let code = demo_code();
            let price = env_f64("BANDBOT_QUOTE", 40.0);
            Arc::new(StaticQuoteService::new().with_quote(code, price))
        }
    }
}

fn build_paper_fund(market: Market) -> (Fund, Arc<PaperBroker>) {
    let code = demo_code();

    let mut fund = Fund::new(demo_user_id(), "paper");
    fund.insert_algo_config(AlgoConfig {
        code: code.clone(),
        market,
        fixed_quantity: env_i64("BANDBOT_FIXED_QTY", 2500),
        pinned_base_price: None,
        std_dev_range: 20,
        std_dev_multiplier: env_f64("BANDBOT_MULTIPLIER", 0.95),
        target_gross_amount: None,
    });

    let broker = Arc::new(PaperBroker::new(ConnectionConfig {
        account_id: "paper-account".to_string(),
        native_market: Market::Krx,
    }));
    broker.set_quote(&code, env_f64("BANDBOT_QUOTE", 40.0));

    (fund, broker)
}

fn seeded_volatility_store() -> MemoryVolatilityStore {
    let store = MemoryVolatilityStore::new();
    store.set_std_dev(&demo_code(), 20, env_f64("BANDBOT_STD_DEV", 1.35));
    store
}

fn seeded_holding_history() -> MemoryHoldingHistory {
    let history = MemoryHoldingHistory::new();
    let quantity = env_i64("BANDBOT_ANCHOR_QTY", 4000);
    let price = env_f64("BANDBOT_ANCHOR_PRICE", 20.0);

    history.insert(HoldingStock {
        code: demo_code(),
        side: Side::Buy,
        quantity,
        gross: price * quantity as f64,
        date: Utc::now() - ChronoDuration::days(1),
        user_id: demo_user_id(),
        fund_name: "paper".to_string(),
        index_snapshot: None,
        fill_ids: "SEED-1".to_string(),
    });
    history
}

fn demo_code() -> String {
    std::env::var("BANDBOT_CODE").unwrap_or_else(|_| "005930".to_string())
}

fn demo_user_id() -> Uuid {
    Uuid::nil()
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}
