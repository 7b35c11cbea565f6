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

//! Daily HNT/USD earnings for Helium hotspots and validators, backed by a
//! local SQLite cache of reward events and closing oracle prices.

use std::{collections::BTreeMap, sync::Arc};

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use api::{AddressKind, Coverage, HeliumClient};
use db::{DbError, DbObj, SqliteDb};
use prices::PriceCache;
use rewards::RewardCache;
use rollup::{daily_rollup, DailySubtotal};

pub mod api;
pub mod db;
pub mod prices;
pub mod rewards;
pub mod rollup;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbError),

    /// General error.
    #[error("Error: {0}")]
    Error(#[from] anyhow::Error),
}

/// One address's priced earnings over a requested day range.
#[derive(Debug, Serialize)]
pub struct EarningsReport {
    pub address: String,
    /// Resolved address kind, present only when this call had to ask the
    /// remote API; fully cached answers leave it unset.
    pub kind: Option<AddressKind>,
    pub coverage: Coverage,
    pub days: BTreeMap<NaiveDate, DailySubtotal>,
}

pub struct EarningsService {
    rewards: RewardCache,
    prices: PriceCache,
}

impl EarningsService {
    /// Open (creating if needed) the cache database at `db_conn` and wire it
    /// to the API at `api_url`.
    pub async fn new(db_conn: &str, api_url: Url) -> Result<Self, ServiceError> {
        let db: DbObj = Arc::new(SqliteDb::new(db_conn).await?);
        let client = HeliumClient::new(api_url)?;

        Ok(Self {
            rewards: RewardCache::new(db.clone(), client.clone()),
            prices: PriceCache::new(db, client),
        })
    }

    /// Daily HNT and USD subtotals for `address` over the half-open day
    /// range [start, stop).
    ///
    /// Remote trouble degrades the report rather than failing it: missing
    /// stretches of rewards and days whose price could not be resolved (and
    /// were valued at zero) both show up in [EarningsReport::coverage]. Only
    /// database failures return an error.
    pub async fn daily_earnings(
        &self,
        address: &str,
        start: NaiveDate,
        stop: NaiveDate,
    ) -> Result<EarningsReport, ServiceError> {
        let earnings = self.rewards.earnings_for(address, start, stop).await?;
        tracing::info!(
            "Rolling up {} reward events for {address} over [{start}, {stop})",
            earnings.events.len()
        );
        let rollup = daily_rollup(&earnings.events, &self.prices).await?;

        Ok(EarningsReport {
            address: address.to_string(),
            kind: earnings.kind,
            coverage: earnings.coverage.merge(rollup.coverage),
            days: rollup.days,
        })
    }
}
