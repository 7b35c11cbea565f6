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

use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, ValueEnum};
use helium_pricer::{api::DEFAULT_API_URL, EarningsService};
use url::Url;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Csv,
    Json,
}

/// Arguments of the earnings pricer.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct MainArgs {
    /// Hotspot or validator address to price.
    address: String,
    /// First day to include (UTC). Defaults to the day before stop.
    #[clap(long)]
    start: Option<NaiveDate>,
    /// Day after the last day to include (UTC). Defaults to today.
    #[clap(long)]
    stop: Option<NaiveDate>,
    /// DB connection string.
    #[clap(short, long, default_value = "sqlite:helium-cache.db")]
    db: String,
    /// Base URL of the Helium API.
    #[clap(long, env, default_value = DEFAULT_API_URL)]
    api_url: Url,
    /// Output format.
    #[clap(short, long, value_enum, default_value = "csv")]
    format: Format,
    /// Emit logs as JSON.
    #[clap(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = MainArgs::parse();

    let filter = tracing_subscriber::EnvFilter::from_default_env();
    if args.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment variables from {:?}", path),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => bail!("failed to load .env file: {}", e),
    }

    // NOTE: Using a separate `run` function to facilitate testing below.
    run(&args).await?;

    Ok(())
}

async fn run(args: &MainArgs) -> Result<()> {
    let (start, stop) = resolve_range(args.start, args.stop, Utc::now().date_naive())?;

    let service = EarningsService::new(&args.db, args.api_url.clone()).await?;
    let report = service.daily_earnings(&args.address, start, stop).await?;

    if !report.coverage.is_complete() {
        tracing::warn!("Report for {} is incomplete: {:?}", args.address, report.coverage);
    }

    match args.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Csv => {
            let kind = report.kind.map_or_else(|| "unknown".to_string(), |k| k.to_string());
            println!("# {} ({kind})", report.address);
            println!("date,hnt,usd");
            for (day, subtotal) in &report.days {
                println!("{day},{},{}", subtotal.hnt, subtotal.usd);
            }
        }
    }

    Ok(())
}

/// Apply the range defaults (stop: today; start: the day before stop, so a
/// bare invocation prices yesterday) and reject ranges reaching into the
/// future. Today itself is excluded: its closing price does not exist yet.
fn resolve_range(
    start: Option<NaiveDate>,
    stop: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate)> {
    let stop = stop.unwrap_or(today);
    let start = start.unwrap_or(stop - Duration::days(1));
    if stop > today {
        bail!("stop day {stop} is in the future");
    }
    if start > stop {
        bail!("start day {start} is after stop day {stop}");
    }
    Ok((start, stop))
}
