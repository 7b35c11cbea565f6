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

//! Client for the Helium blockchain REST API, including the cursor-paged
//! result merging described in the API's "Cursors" documentation.

use std::fmt;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::db::{encode_ts, RewardEvent};

/// Default public API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.helium.io/v1";

/// How much of a requested range a fetch actually produced.
///
/// Transport and decode failures during paging do not abort the request;
/// they truncate it. `Partial` makes that truncation observable to callers
/// instead of leaving them to infer it from a short result list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    Complete,
    Partial { cause: String },
}

impl Coverage {
    pub fn is_complete(&self) -> bool {
        matches!(self, Coverage::Complete)
    }

    /// Combine two coverage observations, keeping the first degradation seen.
    pub fn merge(self, other: Coverage) -> Coverage {
        match self {
            Coverage::Complete => other,
            partial => partial,
        }
    }
}

/// Result of one logical paged GET: all merged records plus how complete
/// the merge was.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub coverage: Coverage,
}

/// Every response wraps its payload in a `data` key; paged responses add a
/// `cursor` for the next page.
#[derive(Deserialize)]
struct Envelope {
    data: Option<Value>,
    cursor: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    Hotspot,
    Validator,
}

impl AddressKind {
    fn path_segment(&self) -> &'static str {
        match self {
            AddressKind::Hotspot => "hotspots",
            AddressKind::Validator => "validators",
        }
    }
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressKind::Hotspot => write!(f, "hotspot"),
            AddressKind::Validator => write!(f, "validator"),
        }
    }
}

/// Wire shape of one reward event from the rewards endpoints.
#[derive(Deserialize)]
struct RewardJson {
    hash: String,
    timestamp: DateTime<Utc>,
    block: i64,
    amount: i64,
}

#[derive(Deserialize)]
struct HeightJson {
    height: i64,
}

#[derive(Deserialize)]
struct OraclePriceJson {
    price: i64,
}

/// Client for the Helium API
#[derive(Clone, Debug)]
pub struct HeliumClient {
    client: Client,
    base_url: Url,
}

impl HeliumClient {
    /// Create a new client with an explicit base URL.
    pub fn new(base_url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("helium-pricer/0.3")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, base_url })
    }

    fn url_for(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined).with_context(|| format!("Failed to build URL for {path}"))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get_envelope(&self, url: Url) -> Result<Envelope> {
        let url_str = url.to_string();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url_str}"))?;

        if !response.status().is_success() {
            anyhow::bail!("API error from {}: {}", url_str, response.status());
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to decode response from {url_str}"))
    }

    /// Perform one logical paged GET, merging every page's `data` array into
    /// a single record list.
    ///
    /// Paging stops when a response carries no cursor. A response whose
    /// `data` is a single object (not a list) is returned as the sole item
    /// without further paging. On any transport or decode error the records
    /// merged so far are returned tagged [Coverage::Partial]; errors never
    /// propagate out of the pager.
    pub async fn paged_get(&self, path: &str, query: &[(&str, String)]) -> Paged<Value> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut page_query: Vec<(&str, String)> = query.to_vec();
            if let Some(cursor) = cursor.as_ref() {
                page_query.push(("cursor", cursor.clone()));
            }

            let envelope = match self.url_for(path, &page_query) {
                Ok(url) => self.get_envelope(url).await,
                Err(err) => Err(err),
            };

            match envelope {
                Ok(envelope) => match envelope.data {
                    Some(Value::Array(page)) => {
                        items.extend(page);
                        tracing::debug!(
                            "Merged page from {path}, {} records so far, next cursor: {:?}",
                            items.len(),
                            envelope.cursor
                        );
                        cursor = envelope.cursor;
                        if cursor.is_none() {
                            break;
                        }
                    }
                    // Not a JSON array, so not a paged result.
                    Some(single) => {
                        return Paged { items: vec![single], coverage: Coverage::Complete }
                    }
                    None => break,
                },
                Err(err) => {
                    tracing::error!("Paged GET of {path} aborted: {err:#}");
                    return Paged { items, coverage: Coverage::Partial { cause: format!("{err:#}") } };
                }
            }
        }

        Paged { items, coverage: Coverage::Complete }
    }

    /// Determine whether `address` names a hotspot or a validator, probing
    /// the per-kind lookup endpoints. `Ok(None)` means the address is
    /// genuinely neither; a failed probe is an error, so callers can tell an
    /// unknown address apart from an unreachable API.
    pub async fn classify_address(&self, address: &str) -> Result<Option<AddressKind>> {
        for kind in [AddressKind::Hotspot, AddressKind::Validator] {
            if self
                .address_exists(kind, address)
                .await
                .with_context(|| format!("Failed to probe {kind} endpoint for {address}"))?
            {
                return Ok(Some(kind));
            }
        }
        Ok(None)
    }

    async fn address_exists(&self, kind: AddressKind, address: &str) -> Result<bool> {
        let url = self.url_for(&format!("{}/{}", kind.path_segment(), address), &[])?;
        let url_str = url.to_string();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url_str}"))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            anyhow::bail!("API error from {}: {}", url_str, response.status());
        }

        let envelope: Envelope = response
            .json()
            .await
            .with_context(|| format!("Failed to decode response from {url_str}"))?;
        Ok(envelope.data.is_some())
    }

    /// Fetch all reward events for `address` in [min_time, max_time),
    /// merging pages. Records that fail to decode are skipped and downgrade
    /// the coverage.
    pub async fn fetch_rewards(
        &self,
        kind: AddressKind,
        address: &str,
        min_time: DateTime<Utc>,
        max_time: DateTime<Utc>,
    ) -> Paged<RewardEvent> {
        let path = format!("{}/{}/rewards", kind.path_segment(), address);
        let query =
            [("min_time", encode_ts(&min_time)), ("max_time", encode_ts(&max_time))];
        let raw = self.paged_get(&path, &query).await;

        let mut coverage = raw.coverage;
        let mut events = Vec::with_capacity(raw.items.len());
        for item in raw.items {
            match serde_json::from_value::<RewardJson>(item) {
                Ok(reward) => events.push(RewardEvent {
                    hash: reward.hash,
                    timestamp: reward.timestamp,
                    address: address.to_string(),
                    block: reward.block,
                    amount_bones: reward.amount,
                }),
                Err(err) => {
                    tracing::warn!("Skipping undecodable reward record for {address}: {err}");
                    coverage =
                        coverage.merge(Coverage::Partial { cause: format!("bad record: {err}") });
                }
            }
        }

        Paged { items: events, coverage }
    }

    /// Height of the last block produced at or before `instant`.
    pub async fn block_at_time(&self, instant: DateTime<Utc>) -> Result<i64> {
        let url = self.url_for("blocks/height", &[("max_time", encode_ts(&instant))])?;
        let envelope = self.get_envelope(url).await?;
        let data = envelope.data.context("Block height response carried no data")?;
        let height: HeightJson =
            serde_json::from_value(data).context("Failed to decode block height")?;
        Ok(height.height)
    }

    /// Oracle price asserted at `block`, in bones per HNT.
    pub async fn oracle_price_at_block(&self, block: i64) -> Result<i64> {
        let url = self.url_for(&format!("oracle/prices/{block}"), &[])?;
        let envelope = self.get_envelope(url).await?;
        let data = envelope.data.context("Oracle price response carried no data")?;
        let price: OraclePriceJson =
            serde_json::from_value(data).context("Failed to decode oracle price")?;
        Ok(price.price)
    }
}
