use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::{HoldingHistory, VolatilityStore};
use crate::models::{DailyAssetSummary, HoldingStock, Side};
use crate::Result;

/// Postgres-backed volatility and holding stores
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to Postgres and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Connected to Postgres");

        Ok(Self { pool })
    }
}

#[async_trait]
impl VolatilityStore for PostgresStore {
    async fn find_latest_std_dev(&self, symbol: &str, range: u32) -> Result<Option<f64>> {
        let row = sqlx::query(
            r#"
            SELECT symbol, date, std_dev_range, std_dev
            FROM daily_asset_summary
            WHERE symbol = $1 AND std_dev_range = $2
            ORDER BY date DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .bind(range as i32)
        .fetch_optional(&self.pool)
        .await?;

        let summary = row.map(|r| DailyAssetSummary {
            symbol: r.get("symbol"),
            date: r.get("date"),
            std_dev_by_range: HashMap::from([(
                r.get::<i32, _>("std_dev_range") as u32,
                r.get::<f64, _>("std_dev"),
            )]),
        });

        Ok(summary.and_then(|s| s.std_dev(range)))
    }
}

#[async_trait]
impl HoldingHistory for PostgresStore {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<HoldingStock>> {
        let rows = sqlx::query(
            r#"
            SELECT code, side, quantity, gross, date, user_id,
                   fund_name, index_snapshot, fill_ids
            FROM holding_stocks
            WHERE user_id = $1
            ORDER BY date ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut holdings = Vec::with_capacity(rows.len());

        for row in rows {
            let side_str: String = row.get("side");
            let side = match side_str.as_str() {
                "BUY" => Side::Buy,
                "SELL" => Side::Sell,
                other => return Err(format!("Invalid holding side: {}", other).into()),
            };

            let date: DateTime<Utc> = row.get("date");

            holdings.push(HoldingStock {
                code: row.get("code"),
                side,
                quantity: row.get("quantity"),
                gross: row.get("gross"),
                date,
                user_id: row.get("user_id"),
                fund_name: row.get("fund_name"),
                index_snapshot: row.get("index_snapshot"),
                fill_ids: row.get("fill_ids"),
            });
        }

        Ok(holdings)
    }
}
