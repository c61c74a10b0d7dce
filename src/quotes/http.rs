use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use crate::models::Quote;
use crate::quotes::ForeignQuoteService;
use crate::Result;

/// Client for a JSON realtime-quote endpoint
///
/// Expects `GET {base}/quote?code={code}` to answer
/// `{"code": "...", "price": 123.45}`.
#[derive(Clone)]
pub struct HttpQuoteClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    code: String,
    price: f64,
}

impl HttpQuoteClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Build from `QUOTE_API_URL`; `None` when the variable is unset.
    pub fn from_env() -> Option<Self> {
        std::env::var("QUOTE_API_URL").ok().map(Self::new)
    }
}

#[async_trait]
impl ForeignQuoteService for HttpQuoteClient {
    async fn get_realtime_quote(&self, code: &str) -> Result<Quote> {
        let url = format!("{}/quote?code={}", self.base_url, code);

        let response: QuoteResponse = self.client.get(&url).send().await?.json().await?;
        tracing::debug!("Realtime quote for {}: {}", response.code, response.price);

        Ok(Quote {
            code: response.code,
            price: response.price,
            time: Utc::now(),
        })
    }
}
