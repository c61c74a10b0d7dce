// Read-only stores the engine consumes: trailing volatility and the
// historical holding ledger. Both are produced by external jobs (the
// daily summary batch and the broker-sync) before the engine ever runs.

pub mod postgres;

pub use postgres::PostgresStore;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::HoldingStock;
use crate::Result;

/// Trailing volatility lookups
#[async_trait]
pub trait VolatilityStore: Send + Sync {
    /// Most recent std dev for (symbol, lookback range), if any exists.
    async fn find_latest_std_dev(&self, symbol: &str, range: u32) -> Result<Option<f64>>;
}

/// Historical closed-transaction lookups
#[async_trait]
pub trait HoldingHistory: Send + Sync {
    /// All holdings for a user, ordered by date ascending.
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<HoldingStock>>;
}

/// In-memory volatility store for paper sweeps and tests.
#[derive(Default)]
pub struct MemoryVolatilityStore {
    values: Mutex<HashMap<(String, u32), f64>>,
}

impl MemoryVolatilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_std_dev(&self, symbol: &str, range: u32, std_dev: f64) {
        self.values
            .lock()
            .unwrap()
            .insert((symbol.to_string(), range), std_dev);
    }
}

#[async_trait]
impl VolatilityStore for MemoryVolatilityStore {
    async fn find_latest_std_dev(&self, symbol: &str, range: u32) -> Result<Option<f64>> {
        Ok(self
            .values
            .lock()
            .unwrap()
            .get(&(symbol.to_string(), range))
            .copied())
    }
}

/// In-memory holding ledger for paper sweeps and tests.
#[derive(Default)]
pub struct MemoryHoldingHistory {
    rows: Mutex<Vec<HoldingStock>>,
}

impl MemoryHoldingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, holding: HoldingStock) {
        let mut rows = self.rows.lock().unwrap();
        rows.push(holding);
        rows.sort_by_key(|h| h.date);
    }
}

#[async_trait]
impl HoldingHistory for MemoryHoldingHistory {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<HoldingStock>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect())
    }
}
