//! burnflow - daily XRPL metrics runner
//!
//! Estimates the current day (local midnight to now) and either records it in
//! the rolling history file or just prints it.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin burnflow                 # update (default)
//! cargo run --release --bin burnflow -- check        # live report, history untouched
//! cargo run --release --bin burnflow -- update --history /var/lib/burnflow/data.json
//! cargo run --release --bin burnflow -- check --price 2.31
//! ```
//!
//! `--price` replaces the live quote with a fixed value (no exchange volume).
//!
//! ## Environment Variables
//!
//! See `EngineConfig::from_env`. RUST_LOG sets the log level (default: info).
//!
//! Exits with status 1 when the ledger network was unreachable.

use burnflow::estimator::day_window;
use burnflow::history::{self, HistoryEntry};
use burnflow::report::{self, ReportContext};
use burnflow::rpc::snapshot::drops_to_xrp;
use burnflow::{
    CoinGeckoPriceSource, EngineConfig, EstimateRequest, Estimator, FixedPrice, PriceQuote,
    PriceSource, RpcGateway,
};
use chrono::{FixedOffset, Utc};
use std::env;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Update,
    Check,
}

#[derive(Debug)]
struct Args {
    mode: Mode,
    history_path: Option<String>,
    fixed_price: Option<f64>,
}

fn parse_args() -> Result<Args, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut parsed = Args {
        mode: Mode::Update,
        history_path: None,
        fixed_price: None,
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "update" => parsed.mode = Mode::Update,
            "check" => parsed.mode = Mode::Check,
            "--history" => {
                let path = iter.next().ok_or("--history requires a path")?;
                parsed.history_path = Some(path.clone());
            }
            "--price" => {
                let raw = iter.next().ok_or("--price requires a value")?;
                let price: f64 = raw
                    .parse()
                    .map_err(|_| format!("--price: not a number: {}", raw))?;
                if !(price > 0.0) {
                    return Err(format!("--price must be positive, got {}", raw).into());
                }
                parsed.fixed_price = Some(price);
            }
            other => return Err(format!("unknown argument: {}", other).into()),
        }
    }

    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let args = parse_args()?;
    let config = EngineConfig::from_env()?;
    let history_path = args
        .history_path
        .clone()
        .unwrap_or_else(|| config.history_path.clone());

    let tz = config
        .window_utc_offset_hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or("WINDOW_UTC_OFFSET_HOURS out of range")?;
    let now = Utc::now();
    let (window_start, window_end) =
        day_window(now, config.window_utc_offset_hours).ok_or("cannot compute day window")?;
    let date = window_start.with_timezone(&tz).date_naive();

    log::info!("🚀 burnflow {:?} for {}", args.mode, date);
    log::info!("   Nodes: {}", config.nodes.join(", "));
    log::info!("   Policy: {}", config.policy.name());

    let mut entries = match args.mode {
        Mode::Update => history::load_history(&history_path)?,
        Mode::Check => Vec::new(),
    };
    let cached_baseline = history::previous_baseline(&entries, date);
    if let Some(baseline) = cached_baseline {
        log::info!("   Cached baseline: {:.6} XRP", drops_to_xrp(baseline));
    }

    let gateway = RpcGateway::new(config.nodes.clone(), config.rpc_timeout)?;
    let prices: Box<dyn PriceSource> = match args.fixed_price {
        Some(price) => Box::new(FixedPrice(PriceQuote {
            price,
            volume_24h: None,
        })),
        None => Box::new(CoinGeckoPriceSource::new(config.price.clone())?),
    };

    let request = EstimateRequest {
        window_start,
        window_end,
        now,
        cached_baseline,
    };
    let estimator = Estimator::new(&gateway, prices.as_ref(), &config);
    let result = estimator.estimate(&request).await;

    let ctx = ReportContext::new(config.window_utc_offset_hours, &config.price.fiat)
        .ok_or("WINDOW_UTC_OFFSET_HOURS out of range")?;
    println!("{}", report::render(&result, &ctx));

    if args.mode == Mode::Update {
        let entry = HistoryEntry::from_estimate(&result, tz);
        history::upsert_entry(&mut entries, entry, config.history_keep_days);
        history::save_history(&history_path, &entries)?;
        log::info!("✅ Saved entry for {} to {}", date, history_path);
    }

    if result.is_fallback {
        log::error!("❌ Estimate is a fallback; exiting with status 1");
        std::process::exit(1);
    }

    Ok(())
}
