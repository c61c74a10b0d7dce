// Realtime quotes for symbols the broker connection does not trade
// natively (e.g. US tickers on a KRX-native connection).

pub mod http;

pub use http::HttpQuoteClient;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;

use crate::models::Quote;
use crate::Result;

#[async_trait]
pub trait ForeignQuoteService: Send + Sync {
    async fn get_realtime_quote(&self, code: &str) -> Result<Quote>;
}

/// Fixed-price quote service for paper sweeps and tests.
#[derive(Default)]
pub struct StaticQuoteService {
    prices: HashMap<String, f64>,
}

impl StaticQuoteService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(mut self, code: impl Into<String>, price: f64) -> Self {
        self.prices.insert(code.into(), price);
        self
    }
}

#[async_trait]
impl ForeignQuoteService for StaticQuoteService {
    async fn get_realtime_quote(&self, code: &str) -> Result<Quote> {
        match self.prices.get(code) {
            Some(price) => Ok(Quote {
                code: code.to_string(),
                price: *price,
                time: Utc::now(),
            }),
            None => Err(format!("No static quote configured for {}", code).into()),
        }
    }
}
