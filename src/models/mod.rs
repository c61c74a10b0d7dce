use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Order side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Markets the engine can trade on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Market {
    Krx,
    Nasdaq,
    Nyse,
    Amex,
}

impl Market {
    /// A symbol is foreign when its market differs from the broker's
    /// native market; quotes then come from the dedicated quote service.
    pub fn is_foreign_for(&self, native: Market) -> bool {
        *self != native
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Market::Krx => write!(f, "KRX"),
            Market::Nasdaq => write!(f, "NASDAQ"),
            Market::Nyse => write!(f, "NYSE"),
            Market::Amex => write!(f, "AMEX"),
        }
    }
}

impl FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "KRX" => Ok(Market::Krx),
            "NASDAQ" => Ok(Market::Nasdaq),
            "NYSE" => Ok(Market::Nyse),
            "AMEX" => Ok(Market::Amex),
            other => Err(format!("Unknown market: {}", other)),
        }
    }
}

/// Asset class of an execution
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AssetClass {
    Equity,
    Etf,
}

/// A (possibly merged) broker execution
///
/// Broker adapters create one of these per fill callback; fills sharing an
/// order id are merged into a single execution with a quantity-weighted
/// average price before the engine ever sees them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub code: String,
    pub side: Side,
    pub quantity: i64,
    pub price: f64,
    pub time: DateTime<Utc>,
    pub order_id: String,
    /// Ordered, comma-joined fill ids that produced this execution
    pub fill_ids: String,
    pub commission: f64,
    pub market: Market,
    pub asset_class: AssetClass,
}

impl Execution {
    /// Merge another execution of the same order into this one.
    ///
    /// Price is the quantity-weighted average, quantities and commissions
    /// add up, fill ids are comma-joined. The earlier fill time wins.
    pub fn merge(&self, other: &Execution) -> Execution {
        debug_assert_eq!(self.order_id, other.order_id);

        let quantity = self.quantity + other.quantity;
        let price = (self.price * self.quantity as f64 + other.price * other.quantity as f64)
            / quantity as f64;

        Execution {
            code: self.code.clone(),
            side: self.side,
            quantity,
            price,
            time: self.time.min(other.time),
            order_id: self.order_id.clone(),
            fill_ids: format!("{},{}", self.fill_ids, other.fill_ids),
            commission: self.commission + other.commission,
            market: self.market,
            asset_class: self.asset_class,
        }
    }
}

/// Fold a day's fills into one execution per order id.
pub fn merge_by_order_id(executions: Vec<Execution>) -> Vec<Execution> {
    let mut merged: HashMap<String, Execution> = HashMap::new();

    for execution in executions {
        match merged.remove(&execution.order_id) {
            Some(existing) => {
                merged.insert(execution.order_id.clone(), existing.merge(&execution));
            }
            None => {
                merged.insert(execution.order_id.clone(), execution);
            }
        }
    }

    merged.into_values().collect()
}

/// A persisted, closed transaction from a previous trading day
///
/// Created once per confirmed execution by the broker-sync job and never
/// mutated by the engine; these are the non-same-day anchor candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingStock {
    pub code: String,
    pub side: Side,
    pub quantity: i64,
    pub gross: f64,
    pub date: DateTime<Utc>,
    pub user_id: Uuid,
    pub fund_name: String,
    pub index_snapshot: Option<f64>,
    pub fill_ids: String,
}

impl HoldingStock {
    /// View this holding as an execution for anchor resolution.
    /// Price is recovered from the gross amount.
    pub fn to_execution(&self, market: Market) -> Execution {
        Execution {
            code: self.code.clone(),
            side: self.side,
            quantity: self.quantity,
            price: if self.quantity != 0 {
                self.gross / self.quantity as f64
            } else {
                0.0
            },
            time: self.date,
            order_id: self.fill_ids.clone(),
            fill_ids: self.fill_ids.clone(),
            commission: 0.0,
            market,
            asset_class: AssetClass::Equity,
        }
    }
}

/// A live order as the broker reports it
///
/// Fetched fresh every tick, never cached across ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub code: String,
    pub side: Side,
    pub quantity: i64,
    pub price: f64,
    pub order_id: String,
    pub filled_quantity: i64,
    pub filled_average_price: f64,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// An order with some but not all quantity executed. Signals the
    /// engine to pause automated action for the symbol.
    pub fn is_partial_filled(&self) -> bool {
        self.filled_quantity > 0 && self.filled_quantity < self.quantity
    }
}

/// A market quote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub code: String,
    pub price: f64,
    pub time: DateTime<Utc>,
}

/// Per-(fund, code) strategy parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgoConfig {
    pub code: String,
    pub market: Market,
    /// Fixed buy quantity; 0 means unset
    pub fixed_quantity: i64,
    /// Reserved: carried through configuration but not consumed by the
    /// reconciliation path.
    pub pinned_base_price: Option<f64>,
    /// Volatility lookback in days
    pub std_dev_range: u32,
    /// Risk scaling applied to the trailing std dev
    pub std_dev_multiplier: f64,
    /// Dynamic sizing: buy whatever quantity this gross amount affords
    pub target_gross_amount: Option<f64>,
}

/// A stock position held by a fund
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundHolding {
    pub code: String,
    pub quantity: i64,
    pub average_price: f64,
}

/// A fund: one broker connection, a set of holdings and strategy configs
///
/// Maps are keyed by the encoded code so punctuation in tickers
/// (e.g. "BRK.B") cannot break map semantics downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fund {
    pub user_id: Uuid,
    pub name: String,
    pub holdings: HashMap<String, FundHolding>,
    pub algo_configs: HashMap<String, AlgoConfig>,
}

impl Fund {
    pub fn new(user_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            holdings: HashMap::new(),
            algo_configs: HashMap::new(),
        }
    }

    pub fn insert_algo_config(&mut self, config: AlgoConfig) {
        self.algo_configs.insert(encode_code(&config.code), config);
    }

    pub fn algo_config(&self, code: &str) -> Option<&AlgoConfig> {
        self.algo_configs.get(&encode_code(code))
    }

    pub fn insert_holding(&mut self, holding: FundHolding) {
        self.holdings.insert(encode_code(&holding.code), holding);
    }

    pub fn holding(&self, code: &str) -> Option<&FundHolding> {
        self.holdings.get(&encode_code(code))
    }
}

/// Externally computed daily volatility snapshot for a symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyAssetSummary {
    pub symbol: String,
    pub date: DateTime<Utc>,
    pub std_dev_by_range: HashMap<u32, f64>,
}

impl DailyAssetSummary {
    /// Std dev for a lookback range, if this snapshot carries one.
    pub fn std_dev(&self, range: u32) -> Option<f64> {
        self.std_dev_by_range.get(&range).copied()
    }
}

/// Percent-escape a symbol code for use as a map key.
/// Round-trips through [`decode_code`].
pub fn encode_code(code: &str) -> String {
    code.replace('%', "%25").replace('.', "%2E")
}

/// Inverse of [`encode_code`].
pub fn decode_code(encoded: &str) -> String {
    encoded.replace("%2E", ".").replace("%25", "%")
}
