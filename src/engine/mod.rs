// Algorithmic order management engine: anchor resolution, band pricing
// and pending-order reconciliation, per (fund, market, symbol).

pub mod base_execution;
pub mod error;
pub mod price_band;
pub mod processor;
pub mod quantity;
pub mod reconciler;
pub mod sweep;

pub use base_execution::{assemble_side, find_base_execution, sort_for_resolution};
pub use error::EngineError;
pub use price_band::{target_price, TickTable, MAX_ADJUST_PCT};
pub use processor::{SymbolOutcome, SymbolProcessor};
pub use quantity::{resolve_buy_quantity, resolve_sell_quantity};
pub use reconciler::{OrderReconciler, ReconcileOutcome, PRICE_MATCH_TOLERANCE};
pub use sweep::{run_market_tick, FundConnection, SweepDeps, SweepSummary};
