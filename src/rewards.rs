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

//! Persistent cache of per-address reward events, reconciled against the
//! remote API with a min/max watermark.
//!
//! The store keeps a contiguous time range per address. Requests inside the
//! watermark are served entirely from SQLite; requests past either edge
//! extend the range with a one-second overlap so an event sitting exactly on
//! the watermark cannot be dropped by a half-open remote fetch. Only
//! single-sided extension is handled: interior gaps created by pathological
//! call orders stay unfilled.

use anyhow::Result as AnyResult;
use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::{
    api::{AddressKind, Coverage, HeliumClient},
    db::{DbObj, RewardEvent},
    ServiceError,
};

/// Overlap in seconds added to watermark-edge fetches.
const WATERMARK_OVERLAP_SECS: i64 = 1;

/// Reward events covering one requested range, with the address kind when a
/// remote fetch resolved it and the fetch coverage observed along the way.
#[derive(Debug, Clone)]
pub struct Earnings {
    pub kind: Option<AddressKind>,
    pub events: Vec<RewardEvent>,
    pub coverage: Coverage,
}

impl Earnings {
    fn empty() -> Self {
        Self { kind: None, events: Vec::new(), coverage: Coverage::Complete }
    }
}

pub struct RewardCache {
    db: DbObj,
    client: HeliumClient,
}

impl RewardCache {
    pub fn new(db: DbObj, client: HeliumClient) -> Self {
        Self { db, client }
    }

    /// All reward events for `address` in the half-open day range
    /// [start, stop), fetching only the parts the local store does not
    /// already cover.
    ///
    /// Remote problems degrade the result (empty or partial, with the cause
    /// in [Earnings::coverage]); only database failures propagate as errors.
    pub async fn earnings_for(
        &self,
        address: &str,
        start: NaiveDate,
        stop: NaiveDate,
    ) -> Result<Earnings, ServiceError> {
        let start_ts = day_start(start);
        let stop_ts = day_start(stop);
        if start_ts >= stop_ts {
            return Ok(Earnings::empty());
        }

        let mut kind = None;
        let mut coverage = Coverage::Complete;

        match self.db.reward_watermark(address).await? {
            None => {
                tracing::debug!("No cached rewards for {address}, fetching full range");
                match self.classify(address).await {
                    Ok(Some(resolved)) => {
                        kind = Some(resolved);
                        coverage = self.fetch_and_store(resolved, address, start_ts, stop_ts).await?;
                    }
                    // Genuinely neither kind; an empty result is the answer.
                    Ok(None) => return Ok(Earnings::empty()),
                    Err(err) => {
                        tracing::error!("Address probe for {address} failed: {err:#}");
                        coverage =
                            Coverage::Partial { cause: format!("address probe failed: {err:#}") };
                    }
                }
            }
            Some((low, high)) => {
                // Watermarks are compared at day granularity: the request is
                // day-ranged, and an event-level comparison would refetch on
                // every call whenever the first event of the low day falls
                // after midnight.
                let low_day = day_start(low.date_naive());
                let high_day = day_start(high.date_naive());
                let mut extensions = Vec::new();
                let overlap = Duration::seconds(WATERMARK_OVERLAP_SECS);
                if start_ts < low_day {
                    extensions.push((start_ts, low_day + overlap));
                }
                if stop_ts > high_day + Duration::days(1) {
                    extensions.push((high_day - overlap, stop_ts));
                }

                if !extensions.is_empty() {
                    match self.classify(address).await {
                        Ok(Some(resolved)) => {
                            kind = Some(resolved);
                            for (min_time, max_time) in extensions {
                                tracing::debug!(
                                    "Extending reward cache for {address}: [{min_time}, {max_time})"
                                );
                                coverage = coverage.merge(
                                    self.fetch_and_store(resolved, address, min_time, max_time)
                                        .await?,
                                );
                            }
                        }
                        Ok(None) => {
                            // Cannot extend; serve what the store holds and
                            // surface the shortfall.
                            coverage = Coverage::Partial {
                                cause: "address kind could not be resolved for cache extension"
                                    .to_string(),
                            };
                        }
                        Err(err) => {
                            tracing::error!("Address probe for {address} failed: {err:#}");
                            coverage = Coverage::Partial {
                                cause: format!("address probe failed: {err:#}"),
                            };
                        }
                    }
                }
            }
        }

        // The store now covers the range; answer from there, trimming the
        // overlap back to exactly [start, stop).
        let events = self.db.get_rewards(address, start_ts, stop_ts).await?;
        Ok(Earnings { kind, events, coverage })
    }

    async fn classify(&self, address: &str) -> AnyResult<Option<AddressKind>> {
        let kind = self.client.classify_address(address).await?;
        if kind.is_none() {
            tracing::warn!("Address {address} is neither a hotspot nor a validator");
        }
        Ok(kind)
    }

    async fn fetch_and_store(
        &self,
        kind: AddressKind,
        address: &str,
        min_time: DateTime<Utc>,
        max_time: DateTime<Utc>,
    ) -> Result<Coverage, ServiceError> {
        let fetched = self.client.fetch_rewards(kind, address, min_time, max_time).await;
        tracing::debug!("Fetched {} reward events for {address}", fetched.items.len());
        self.db.put_rewards(&fetched.items).await?;
        Ok(fetched.coverage)
    }
}

/// Midnight UTC opening the given day.
pub fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(0, 0, 0).expect("midnight is always valid").and_utc()
}
