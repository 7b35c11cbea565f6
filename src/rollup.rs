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

//! Grouping of raw reward events into per-day HNT/USD subtotals.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    api::Coverage,
    db::RewardEvent,
    prices::{PriceCache, Resolution},
    ServiceError,
};

/// Smallest indivisible unit of HNT; oracle prices use the same scale for
/// the USD side.
pub const BONES_PER_HNT: i64 = 100_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailySubtotal {
    pub hnt: f64,
    pub price_usd: f64,
    pub usd: f64,
}

/// Priced daily subtotals plus how trustworthy the pricing was: a day whose
/// price could not be resolved is valued at zero and degrades the coverage.
#[derive(Debug)]
pub struct DailyRollup {
    pub days: BTreeMap<NaiveDate, DailySubtotal>,
    pub coverage: Coverage,
}

/// Group `events` by UTC calendar day and price each day at its closing
/// oracle price.
///
/// Amounts are summed regardless of sign: a zero or negative reward is
/// legitimate data and is never dropped. Summation happens in bones so the
/// float conversion is applied exactly once per day.
pub async fn daily_rollup(
    events: &[RewardEvent],
    prices: &PriceCache,
) -> Result<DailyRollup, ServiceError> {
    let mut bones_by_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for event in events {
        *bones_by_day.entry(event.timestamp.date_naive()).or_insert(0) += event.amount_bones;
    }

    let mut days = BTreeMap::new();
    let mut coverage = Coverage::Complete;
    for (day, bones) in bones_by_day {
        let price = prices.price_for(day).await?;
        if let Resolution::Unresolved { cause } = &price.resolution {
            coverage = coverage
                .merge(Coverage::Partial { cause: format!("price for {day} unresolved: {cause}") });
        }
        let hnt = bones as f64 / BONES_PER_HNT as f64;
        let price_usd = price.price_bones as f64 / BONES_PER_HNT as f64;
        days.insert(day, DailySubtotal { hnt, price_usd, usd: hnt * price_usd });
    }

    Ok(DailyRollup { days, coverage })
}
