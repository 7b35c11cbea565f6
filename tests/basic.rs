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

use chrono::NaiveDate;
use helium_pricer::{api::AddressKind, EarningsService};
use httpmock::prelude::*;
use tempfile::TempDir;

const ADDR: &str = "112qB3YaH5bZkCnKA5uRH7tBtGNv2Y5B4smv1jsmvGUzgKT71QpE";

fn day(raw: &str) -> NaiveDate {
    raw.parse().unwrap()
}

fn db_conn(dir: &TempDir) -> String {
    format!("sqlite:{}", dir.path().join("cache.db").display())
}

/// Mock the full API surface one pricing run touches: classification,
/// rewards, block-at-time and oracle price lookups.
fn mock_api(server: &MockServer) -> (httpmock::Mock<'_>, httpmock::Mock<'_>, httpmock::Mock<'_>) {
    let classify = server.mock(|when, then| {
        when.method(GET).path(format!("/hotspots/{ADDR}"));
        then.status(200).json_body(serde_json::json!({"data": {"address": ADDR}}));
    });
    let rewards = server.mock(|when, then| {
        when.method(GET)
            .path(format!("/hotspots/{ADDR}/rewards"))
            .query_param("min_time", "2021-03-27T00:00:00.000000Z")
            .query_param("max_time", "2021-03-28T00:00:00.000000Z");
        then.status(200).json_body(serde_json::json!({"data": [
            {
                "hash": "h1",
                "timestamp": "2021-03-27T01:00:00.000000Z",
                "block": 755590,
                "amount": 100000000
            },
            {
                "hash": "h2",
                "timestamp": "2021-03-27T13:00:00.000000Z",
                "block": 755600,
                "amount": 50000000
            }
        ]}));
    });
    let height = server.mock(|when, then| {
        when.method(GET)
            .path("/blocks/height")
            .query_param("max_time", "2021-03-27T23:59:59.999999Z");
        then.status(200).json_body(serde_json::json!({"data": {"height": 755610}}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/oracle/prices/755610");
        then.status(200).json_body(serde_json::json!({"data": {
            "price": 200000000,
            "block": 755610,
            "timestamp": "2021-03-27T23:45:00.000000Z"
        }}));
    });
    (classify, rewards, height)
}

#[tokio::test]
async fn prices_a_day_end_to_end() {
    let server = MockServer::start();
    mock_api(&server);
    let dir = TempDir::new().unwrap();

    let service = EarningsService::new(&db_conn(&dir), server.base_url().parse().unwrap())
        .await
        .unwrap();
    let report =
        service.daily_earnings(ADDR, day("2021-03-27"), day("2021-03-28")).await.unwrap();

    assert_eq!(report.address, ADDR);
    assert_eq!(report.kind, Some(AddressKind::Hotspot));
    assert!(report.coverage.is_complete());
    assert_eq!(report.days.len(), 1);

    // 1.5 HNT at 2 USD/HNT.
    let subtotal = &report.days[&day("2021-03-27")];
    assert_eq!(subtotal.hnt, 1.5);
    assert_eq!(subtotal.price_usd, 2.0);
    assert_eq!(subtotal.usd, 3.0);
}

#[tokio::test]
async fn second_run_on_same_db_is_fully_cached() {
    let server = MockServer::start();
    let (classify, rewards, height) = mock_api(&server);
    let dir = TempDir::new().unwrap();
    let conn = db_conn(&dir);
    let api_url: url::Url = server.base_url().parse().unwrap();

    let first = EarningsService::new(&conn, api_url.clone()).await.unwrap();
    let warm = first.daily_earnings(ADDR, day("2021-03-27"), day("2021-03-28")).await.unwrap();
    assert_eq!(warm.days[&day("2021-03-27")].usd, 3.0);
    classify.assert_hits(1);
    rewards.assert_hits(1);
    height.assert_hits(1);

    // A fresh service over the same database file answers identically with
    // zero additional remote calls.
    let second = EarningsService::new(&conn, api_url).await.unwrap();
    let cached = second.daily_earnings(ADDR, day("2021-03-27"), day("2021-03-28")).await.unwrap();

    assert_eq!(cached.kind, None);
    assert!(cached.coverage.is_complete());
    assert_eq!(cached.days[&day("2021-03-27")].usd, 3.0);
    classify.assert_hits(1);
    rewards.assert_hits(1);
    height.assert_hits(1);
}

#[tokio::test]
async fn price_failure_degrades_report_coverage() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(format!("/hotspots/{ADDR}"));
        then.status(200).json_body(serde_json::json!({"data": {"address": ADDR}}));
    });
    server.mock(|when, then| {
        when.method(GET).path(format!("/hotspots/{ADDR}/rewards"));
        then.status(200).json_body(serde_json::json!({"data": [
            {
                "hash": "h1",
                "timestamp": "2021-03-27T01:00:00.000000Z",
                "block": 755590,
                "amount": 100000000
            }
        ]}));
    });
    // No block/price routes: the day's price cannot be resolved.
    let dir = TempDir::new().unwrap();

    let service = EarningsService::new(&db_conn(&dir), server.base_url().parse().unwrap())
        .await
        .unwrap();
    let report =
        service.daily_earnings(ADDR, day("2021-03-27"), day("2021-03-28")).await.unwrap();

    // The day shows up zero-valued, and the report says so.
    assert!(!report.coverage.is_complete());
    let subtotal = &report.days[&day("2021-03-27")];
    assert_eq!(subtotal.hnt, 1.0);
    assert_eq!(subtotal.usd, 0.0);
}

#[tokio::test]
async fn unknown_address_yields_empty_report() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path_contains("/hotspots/");
        then.status(404).json_body(serde_json::json!({"error": "not_found"}));
    });
    server.mock(|when, then| {
        when.method(GET).path_contains("/validators/");
        then.status(404).json_body(serde_json::json!({"error": "not_found"}));
    });
    let dir = TempDir::new().unwrap();

    let service = EarningsService::new(&db_conn(&dir), server.base_url().parse().unwrap())
        .await
        .unwrap();
    let report =
        service.daily_earnings(ADDR, day("2021-03-27"), day("2021-03-28")).await.unwrap();

    assert_eq!(report.kind, None);
    assert!(report.days.is_empty());
    assert!(report.coverage.is_complete());
}
