// Broker abstraction: the engine only ever talks to this narrow contract.
// Vendor SDKs (callback-correlation clients, proprietary sessions) live in
// separate adapter implementations and never leak types into the engine.

pub mod paper;

pub use paper::PaperBroker;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Execution, Market, Order, Quote, Side};
use crate::Result;

/// Connection parameters for one fund's broker session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub account_id: String,
    pub native_market: Market,
}

/// Broker acknowledgement for a place/cancel command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCommandResult {
    pub order_id: Option<String>,
    pub error_code: i32,
    pub message: String,
}

impl OrderCommandResult {
    pub fn ok(order_id: impl Into<String>) -> Self {
        Self {
            order_id: Some(order_id.into()),
            error_code: 0,
            message: String::new(),
        }
    }

    pub fn error(error_code: i32, message: impl Into<String>) -> Self {
        Self {
            order_id: None,
            error_code,
            message: message.into(),
        }
    }

    /// Brokers signal failure with a positive error code.
    pub fn is_err(&self) -> bool {
        self.error_code > 0
    }
}

/// One fund's live broker connection.
///
/// Connections are not assumed safe for concurrent requests; callers must
/// serialize calls per connection. The sweep gives each fund's connection
/// its own task and keeps symbols sequential within it.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// The market this connection trades natively; quotes for symbols on
    /// other markets come from the foreign quote service instead.
    fn native_market(&self) -> Market;

    /// All currently resting orders on the given market.
    async fn get_pending_orders(&self, market: Market) -> Result<Vec<Order>>;

    /// Live quote for a natively traded symbol.
    async fn get_stock_quote(&self, code: &str) -> Result<Quote>;

    /// Today's executions, merged per order id by the adapter.
    async fn get_stock_today_executions(
        &self,
        market: Market,
    ) -> Result<HashMap<String, Execution>>;

    async fn place_order(
        &self,
        side: Side,
        code: &str,
        quantity: i64,
        price: f64,
    ) -> Result<OrderCommandResult>;

    async fn cancel_order(&self, order_id: &str, code: &str) -> Result<OrderCommandResult>;
}
