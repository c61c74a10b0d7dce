//! Deterministic in-memory broker.
//!
//! Backs the dry-run binary and the engine tests: sequential order ids,
//! no randomness, no network I/O. State lives behind a single mutex so
//! one instance can serve a whole fund sweep.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::broker::{BrokerClient, ConnectionConfig, OrderCommandResult};
use crate::models::{Execution, Market, Order, Quote, Side};
use crate::Result;

#[derive(Debug, Default)]
struct PaperState {
    next_order_id: u64,
    pending: Vec<Order>,
    today_executions: HashMap<String, Execution>,
    quotes: HashMap<String, f64>,
    placed: Vec<Order>,
    cancelled: Vec<String>,
    place_error: Option<(i32, String)>,
    cancel_error: Option<(i32, String)>,
}

/// In-memory [`BrokerClient`] with deterministic behavior.
pub struct PaperBroker {
    config: ConnectionConfig,
    state: Mutex<PaperState>,
}

impl PaperBroker {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            state: Mutex::new(PaperState {
                next_order_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Set the quote returned for a code.
    pub fn set_quote(&self, code: &str, price: f64) {
        self.state
            .lock()
            .unwrap()
            .quotes
            .insert(code.to_string(), price);
    }

    /// Seed a resting order (e.g. leftovers from a previous tick).
    pub fn seed_pending(&self, order: Order) {
        self.state.lock().unwrap().pending.push(order);
    }

    /// Seed a same-day fill. Fills sharing an order id are merged into a
    /// single execution, as the contract requires of every adapter.
    pub fn seed_execution(&self, execution: Execution) {
        let mut state = self.state.lock().unwrap();
        let merged = match state.today_executions.remove(&execution.order_id) {
            Some(existing) => existing.merge(&execution),
            None => execution,
        };
        state.today_executions.insert(merged.order_id.clone(), merged);
    }

    /// Make the next place_order calls fail with this broker error.
    pub fn set_place_error(&self, error_code: i32, message: &str) {
        self.state.lock().unwrap().place_error = Some((error_code, message.to_string()));
    }

    /// Make the next cancel_order calls fail with this broker error.
    pub fn set_cancel_error(&self, error_code: i32, message: &str) {
        self.state.lock().unwrap().cancel_error = Some((error_code, message.to_string()));
    }

    /// Orders placed through this broker, in placement order.
    pub fn placed_orders(&self) -> Vec<Order> {
        self.state.lock().unwrap().placed.clone()
    }

    /// Order ids cancelled through this broker, in cancellation order.
    pub fn cancelled_order_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().cancelled.clone()
    }

    /// Snapshot of the current resting orders.
    pub fn pending_snapshot(&self) -> Vec<Order> {
        self.state.lock().unwrap().pending.clone()
    }
}

#[async_trait]
impl BrokerClient for PaperBroker {
    fn native_market(&self) -> Market {
        self.config.native_market
    }

    async fn get_pending_orders(&self, _market: Market) -> Result<Vec<Order>> {
        Ok(self.state.lock().unwrap().pending.clone())
    }

    async fn get_stock_quote(&self, code: &str) -> Result<Quote> {
        let state = self.state.lock().unwrap();
        match state.quotes.get(code) {
            Some(price) => Ok(Quote {
                code: code.to_string(),
                price: *price,
                time: Utc::now(),
            }),
            None => Err(format!("No paper quote seeded for {}", code).into()),
        }
    }

    async fn get_stock_today_executions(
        &self,
        _market: Market,
    ) -> Result<HashMap<String, Execution>> {
        Ok(self.state.lock().unwrap().today_executions.clone())
    }

    async fn place_order(
        &self,
        side: Side,
        code: &str,
        quantity: i64,
        price: f64,
    ) -> Result<OrderCommandResult> {
        let mut state = self.state.lock().unwrap();

        if let Some((error_code, message)) = state.place_error.clone() {
            return Ok(OrderCommandResult::error(error_code, message));
        }

        let order_id = format!("ORD-{:06}", state.next_order_id);
        state.next_order_id += 1;

        let order = Order {
            code: code.to_string(),
            side,
            quantity,
            price,
            order_id: order_id.clone(),
            filled_quantity: 0,
            filled_average_price: 0.0,
            created_at: Utc::now(),
        };
        state.pending.push(order.clone());
        state.placed.push(order);

        tracing::debug!(
            account = %self.config.account_id,
            "Paper order {} placed: {} {} x {} @ {}",
            order_id,
            side,
            code,
            quantity,
            price
        );

        Ok(OrderCommandResult::ok(order_id))
    }

    async fn cancel_order(&self, order_id: &str, code: &str) -> Result<OrderCommandResult> {
        let mut state = self.state.lock().unwrap();

        if let Some((error_code, message)) = state.cancel_error.clone() {
            return Ok(OrderCommandResult::error(error_code, message));
        }

        let before = state.pending.len();
        state
            .pending
            .retain(|o| !(o.order_id == order_id && o.code == code));

        if state.pending.len() == before {
            return Ok(OrderCommandResult::error(
                1,
                format!("Unknown order id {}", order_id),
            ));
        }

        state.cancelled.push(order_id.to_string());
        Ok(OrderCommandResult::ok(order_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broker() -> PaperBroker {
        PaperBroker::new(ConnectionConfig {
            account_id: "paper-1".to_string(),
            native_market: Market::Krx,
        })
    }

    #[tokio::test]
    async fn test_place_then_cancel_round_trip() {
        let broker = broker();

        let result = broker
            .place_order(Side::Buy, "005930", 100, 19.74)
            .await
            .unwrap();
        assert!(!result.is_err());
        let order_id = result.order_id.unwrap();
        assert_eq!(order_id, "ORD-000001");
        assert_eq!(broker.pending_snapshot().len(), 1);

        let result = broker.cancel_order(&order_id, "005930").await.unwrap();
        assert!(!result.is_err());
        assert!(broker.pending_snapshot().is_empty());
        assert_eq!(broker.cancelled_order_ids(), vec![order_id]);
    }

    #[tokio::test]
    async fn test_cancel_unknown_order_is_broker_error() {
        let broker = broker();
        let result = broker.cancel_order("ORD-999999", "005930").await.unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_quote_requires_seeding() {
        let broker = broker();
        assert!(broker.get_stock_quote("005930").await.is_err());

        broker.set_quote("005930", 40.0);
        let quote = broker.get_stock_quote("005930").await.unwrap();
        assert_eq!(quote.price, 40.0);
    }

    #[tokio::test]
    async fn test_seeded_fills_merge_per_order_id() {
        use crate::models::AssetClass;

        let broker = broker();
        let fill = |fill_id: &str, quantity: i64, price: f64| Execution {
            code: "005930".to_string(),
            side: Side::Buy,
            quantity,
            price,
            time: Utc::now(),
            order_id: "O1".to_string(),
            fill_ids: fill_id.to_string(),
            commission: 0.0,
            market: Market::Krx,
            asset_class: AssetClass::Equity,
        };

        broker.seed_execution(fill("F1", 100, 10.0));
        broker.seed_execution(fill("F2", 300, 20.0));

        let executions = broker
            .get_stock_today_executions(Market::Krx)
            .await
            .unwrap();
        assert_eq!(executions.len(), 1);

        let merged = &executions["O1"];
        assert_eq!(merged.quantity, 400);
        // (10*100 + 20*300) / 400
        assert_eq!(merged.price, 17.5);
        assert!(merged.fill_ids.contains("F1"));
        assert!(merged.fill_ids.contains("F2"));
    }

    #[tokio::test]
    async fn test_injected_place_error() {
        let broker = broker();
        broker.set_place_error(9, "market closed");

        let result = broker
            .place_order(Side::Buy, "005930", 100, 19.74)
            .await
            .unwrap();
        assert!(result.is_err());
        assert_eq!(result.error_code, 9);
        assert!(broker.pending_snapshot().is_empty());
    }
}
