// Copyright 2026 Boundless Foundation, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQL error: {0}")]
    SqlErr(#[from] sqlx::Error),

    #[error("SQL Migration error: {0}")]
    MigrateErr(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid timestamp in database: {0}")]
    BadTimestamp(String),
}

/// A single reward event, persisted immutably once fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardEvent {
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub address: String,
    pub block: i64,
    pub amount_bones: i64,
}

/// Oracle price resolved for a canonical end-of-day instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OraclePriceRow {
    pub timestamp: DateTime<Utc>,
    pub block: i64,
    pub price_bones: i64,
}

#[async_trait]
pub trait PricerDb {
    /// Upsert a batch of reward events in one transaction, keyed by hash.
    /// Re-inserting an already stored event replaces it in place.
    async fn put_rewards(&self, rewards: &[RewardEvent]) -> Result<(), DbError>;

    /// Rewards for `address` in the half-open range [start, stop), ascending by timestamp.
    async fn get_rewards(
        &self,
        address: &str,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Result<Vec<RewardEvent>, DbError>;

    /// Oldest and newest stored timestamps for `address`, `None` when nothing is cached.
    async fn reward_watermark(
        &self,
        address: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, DbError>;

    /// Price stored for exactly this instant, if any.
    async fn get_price(&self, timestamp: DateTime<Utc>) -> Result<Option<OraclePriceRow>, DbError>;

    /// Upsert a resolved price, keyed by its instant.
    async fn put_price(&self, price: OraclePriceRow) -> Result<(), DbError>;
}

pub type DbObj = Arc<dyn PricerDb + Send + Sync>;

/// Timestamps are stored as fixed-width RFC 3339 UTC strings (microsecond
/// precision, `Z` suffix) so lexicographic ordering in SQLite matches
/// chronological ordering.
pub(crate) fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(raw: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| DbError::BadTimestamp(raw.to_string()))
}

pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Constructs a [SqliteDb] from an existing [SqlitePool]
    ///
    /// This method applies database migrations
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, DbError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Construct a new [SqliteDb] from a connection string, creating the
    /// database file if it does not exist yet.
    pub async fn new(conn_str: &str) -> Result<Self, DbError> {
        let opts = SqliteConnectOptions::from_str(conn_str)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().max_connections(1).connect_with(opts).await?;

        Self::from_pool(pool).await
    }
}

#[async_trait]
impl PricerDb for SqliteDb {
    async fn put_rewards(&self, rewards: &[RewardEvent]) -> Result<(), DbError> {
        if rewards.is_empty() {
            return Ok(());
        }
        tracing::trace!("Persisting {} reward events", rewards.len());

        let mut tx = self.pool.begin().await?;
        for reward in rewards {
            // Fetch windows deliberately overlap already covered time, so
            // replace-on-conflict keeps re-inserts from duplicating events.
            sqlx::query(
                "INSERT INTO rewards (hash, timestamp, address, block, amount_bones) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT(hash) DO UPDATE SET \
                 timestamp = $2, address = $3, block = $4, amount_bones = $5",
            )
            .bind(&reward.hash)
            .bind(encode_ts(&reward.timestamp))
            .bind(&reward.address)
            .bind(reward.block)
            .bind(reward.amount_bones)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn get_rewards(
        &self,
        address: &str,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Result<Vec<RewardEvent>, DbError> {
        let rows = sqlx::query(
            "SELECT hash, timestamp, address, block, amount_bones FROM rewards \
             WHERE address = $1 AND timestamp >= $2 AND timestamp < $3 \
             ORDER BY timestamp ASC",
        )
        .bind(address)
        .bind(encode_ts(&start))
        .bind(encode_ts(&stop))
        .fetch_all(&self.pool)
        .await?;

        let mut rewards = Vec::with_capacity(rows.len());
        for row in rows {
            rewards.push(RewardEvent {
                hash: row.try_get("hash")?,
                timestamp: decode_ts(&row.try_get::<String, _>("timestamp")?)?,
                address: row.try_get("address")?,
                block: row.try_get("block")?,
                amount_bones: row.try_get("amount_bones")?,
            });
        }

        Ok(rewards)
    }

    async fn reward_watermark(
        &self,
        address: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, DbError> {
        let row = sqlx::query(
            "SELECT MIN(timestamp) AS low, MAX(timestamp) AS high FROM rewards WHERE address = $1",
        )
        .bind(address)
        .fetch_one(&self.pool)
        .await?;

        let low: Option<String> = row.try_get("low")?;
        let high: Option<String> = row.try_get("high")?;

        match (low, high) {
            (Some(low), Some(high)) => Ok(Some((decode_ts(&low)?, decode_ts(&high)?))),
            _ => Ok(None),
        }
    }

    async fn get_price(&self, timestamp: DateTime<Utc>) -> Result<Option<OraclePriceRow>, DbError> {
        let row = sqlx::query("SELECT block, price_bones FROM oracle_prices WHERE timestamp = $1")
            .bind(encode_ts(&timestamp))
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(OraclePriceRow {
            timestamp,
            block: row.try_get("block")?,
            price_bones: row.try_get("price_bones")?,
        }))
    }

    async fn put_price(&self, price: OraclePriceRow) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO oracle_prices (timestamp, block, price_bones) VALUES ($1, $2, $3) \
             ON CONFLICT(timestamp) DO UPDATE SET block = $2, price_bones = $3",
        )
        .bind(encode_ts(&price.timestamp))
        .bind(price.block)
        .bind(price.price_bones)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
