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

//! Persistent cache of daily closing oracle prices.
//!
//! Prices are keyed by the canonical end-of-day instant and resolved through
//! a block-height indirection: the oracle price API is keyed by block, not
//! time, so a miss first looks up the block at the target instant and then
//! the price asserted at that block.

use anyhow::{Context, Result as AnyResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::{
    api::HeliumClient,
    db::{DbObj, OraclePriceRow},
    ServiceError,
};

/// Instant of the first oracle price assertion on chain. Days ending before
/// this have no defined price and resolve to zero without any lookup.
const ORACLE_GENESIS: &str = "2020-06-05T00:00:00Z";

/// How a day's price was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Found in the local store.
    Cached,
    /// Resolved remotely and persisted on this call.
    Fetched,
    /// Day ends before the oracle existed; zero is the defined placeholder.
    BeforeOracle,
    /// Remote resolution failed; zero was cached so the day is not retried.
    Unresolved { cause: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayPrice {
    pub price_bones: i64,
    pub resolution: Resolution,
}

pub struct PriceCache {
    db: DbObj,
    client: HeliumClient,
    oracle_start: DateTime<Utc>,
}

impl PriceCache {
    pub fn new(db: DbObj, client: HeliumClient) -> Self {
        let oracle_start = ORACLE_GENESIS
            .parse::<DateTime<Utc>>()
            .expect("oracle genesis constant must be a valid RFC 3339 instant");
        Self { db, client, oracle_start }
    }

    /// The closing oracle price for `day`: the price in effect just before
    /// midnight UTC of the following day.
    ///
    /// Remote failures never surface as errors here; they resolve to a
    /// cached zero tagged [Resolution::Unresolved]. Only database failures
    /// propagate.
    pub async fn price_for(&self, day: NaiveDate) -> Result<DayPrice, ServiceError> {
        let instant = end_of_day(day);

        if instant < self.oracle_start {
            return Ok(DayPrice { price_bones: 0, resolution: Resolution::BeforeOracle });
        }

        if let Some(row) = self.db.get_price(instant).await? {
            return Ok(DayPrice { price_bones: row.price_bones, resolution: Resolution::Cached });
        }

        match self.resolve(instant).await {
            Ok((block, price_bones)) => {
                self.db
                    .put_price(OraclePriceRow { timestamp: instant, block, price_bones })
                    .await?;
                tracing::debug!("Resolved price for {day}: {price_bones} bones at block {block}");
                Ok(DayPrice { price_bones, resolution: Resolution::Fetched })
            }
            Err(err) => {
                tracing::error!("Price resolution for {day} failed: {err:#}");
                // Persist the zero so a known-bad day does not retry forever.
                self.db
                    .put_price(OraclePriceRow { timestamp: instant, block: 0, price_bones: 0 })
                    .await?;
                Ok(DayPrice {
                    price_bones: 0,
                    resolution: Resolution::Unresolved { cause: format!("{err:#}") },
                })
            }
        }
    }

    async fn resolve(&self, instant: DateTime<Utc>) -> AnyResult<(i64, i64)> {
        let block = self
            .client
            .block_at_time(instant)
            .await
            .context("Failed to resolve block at time")?;
        let price = self
            .client
            .oracle_price_at_block(block)
            .await
            .context("Failed to resolve oracle price at block")?;
        Ok((block, price))
    }
}

/// Canonical instant representing the close of `day`: 23:59:59.999999 UTC.
pub fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_micro_opt(23, 59, 59, 999_999)
        .expect("end-of-day components are always valid")
        .and_utc()
}
