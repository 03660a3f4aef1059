//! Estimation orchestrator
//!
//! Composes the pipeline for one window:
//!
//! ```text
//! current validated ledger ──(unobtainable)──→ fallback result
//!     ↓
//! window start (cache / search / fixed offset) → burn = start − current supply
//!     ↓
//! sample recent ledgers → aggregate (scaled by ledgers actually in the window)
//!     ↓
//! price quote → fiat figures
//! ```
//!
//! Every stage after the current ledger can fail on its own; its figures are
//! then left empty while the rest of the result is still produced.

use crate::aggregator::{aggregate, AggregateEstimate, AggregationPolicy};
use crate::category::TxCategory;
use crate::config::EngineConfig;
use crate::price::{PriceQuote, PriceSource};
use crate::resolver::{SnapshotResolver, StartSource, WindowStart};
use crate::rpc::snapshot::{drops_to_xrp, fetch_snapshot};
use crate::rpc::{LedgerIndex, LedgerRpc, LedgerSnapshot};
use crate::sampler::TransactionSampler;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lower bound on the measured span when annualising a burn
const MIN_RATE_HOURS: f64 = 0.01;

/// One estimation request
#[derive(Debug, Clone)]
pub struct EstimateRequest {
    pub window_start: DateTime<Utc>,
    /// Declared end of the window; `now` before it marks the result partial
    pub window_end: DateTime<Utc>,
    pub now: DateTime<Utc>,
    /// Total supply (drops) persisted by a previous run
    pub cached_baseline: Option<u64>,
}

impl EstimateRequest {
    /// The calendar day containing `now` in a timezone `utc_offset_hours` from UTC
    pub fn for_day(
        now: DateTime<Utc>,
        utc_offset_hours: i32,
        cached_baseline: Option<u64>,
    ) -> Option<Self> {
        let (window_start, window_end) = day_window(now, utc_offset_hours)?;
        Some(Self {
            window_start,
            window_end,
            now,
            cached_baseline,
        })
    }
}

/// Local midnight to the next local midnight around `now`
pub fn day_window(
    now: DateTime<Utc>,
    utc_offset_hours: i32,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let tz = FixedOffset::east_opt(utc_offset_hours.checked_mul(3600)?)?;
    let midnight = now
        .with_timezone(&tz)
        .date_naive()
        .and_hms_opt(0, 0, 0)?
        .and_local_timezone(tz)
        .single()?
        .with_timezone(&Utc);
    Some((midnight, midnight + Duration::days(1)))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurnRate {
    pub per_hour: f64,
    pub per_day: f64,
    pub per_year: f64,
}

impl BurnRate {
    pub fn from_elapsed(burn: f64, elapsed_hours: f64) -> Self {
        let per_hour = burn / elapsed_hours.max(MIN_RATE_HOURS);
        let per_day = per_hour * 24.0;
        Self {
            per_hour,
            per_day,
            per_year: per_day * 365.0,
        }
    }
}

/// Final metric set for one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateResult {
    pub window_start: DateTime<Utc>,
    pub now: DateTime<Utc>,
    /// The current ledger itself was unobtainable; nothing else is populated
    pub is_fallback: bool,
    /// `now` is still inside the window
    pub is_partial: bool,
    pub policy: AggregationPolicy,

    pub current_sequence: Option<u64>,
    pub start_sequence: Option<u64>,
    pub start_source: Option<StartSource>,
    /// Ledgers the sample was scaled to
    pub reference_ledgers: Option<u64>,
    /// Mean seconds per ledger over the resolved window
    pub observed_cadence_secs: Option<f64>,

    /// Supply decrease over the window (XRP)
    pub burn_amount: Option<f64>,
    /// Burn over the close times of the two supply readings; unknown when the
    /// start reading has no close time (cached baseline)
    pub burn_rate: Option<BurnRate>,

    pub sample_ledgers_requested: u64,
    pub sample_ledgers_fetched: u64,
    pub aggregate: AggregateEstimate,

    pub price: Option<f64>,
    /// On-chain settlement volume priced in fiat
    pub settlement_value_fiat: Option<f64>,
    /// Settlement value attributed per category by transaction share
    pub category_value_fiat: BTreeMap<TxCategory, f64>,
    /// Exchange-reported 24h trading volume, unrelated to on-chain settlement
    pub exchange_volume_24h_fiat: Option<f64>,

    /// Current total supply (drops) for the caller to persist as the next baseline
    pub baseline_for_next: Option<u64>,
}

impl EstimateResult {
    fn empty(request: &EstimateRequest, policy: AggregationPolicy) -> Self {
        Self {
            window_start: request.window_start,
            now: request.now,
            is_fallback: false,
            is_partial: request.now < request.window_end,
            policy,
            current_sequence: None,
            start_sequence: None,
            start_source: None,
            reference_ledgers: None,
            observed_cadence_secs: None,
            burn_amount: None,
            burn_rate: None,
            sample_ledgers_requested: 0,
            sample_ledgers_fetched: 0,
            aggregate: AggregateEstimate::unavailable(),
            price: None,
            settlement_value_fiat: None,
            category_value_fiat: BTreeMap::new(),
            exchange_volume_24h_fiat: None,
            baseline_for_next: None,
        }
    }

    /// Result for an unreachable ledger network
    pub fn fallback(request: &EstimateRequest, policy: AggregationPolicy) -> Self {
        Self {
            is_fallback: true,
            ..Self::empty(request, policy)
        }
    }

    pub fn category_shares(&self) -> &BTreeMap<TxCategory, f64> {
        &self.aggregate.category_shares
    }

    pub fn elapsed_hours(&self) -> f64 {
        (self.now - self.window_start).num_seconds() as f64 / 3600.0
    }
}

/// Supply decrease from `start` to `current`; `None` unless supply went down
pub fn burn_between(start_supply_drops: u64, current_supply_drops: u64) -> Option<f64> {
    start_supply_drops
        .checked_sub(current_supply_drops)
        .filter(|burned| *burned > 0)
        .map(drops_to_xrp)
}

pub struct Estimator<'a> {
    rpc: &'a dyn LedgerRpc,
    prices: &'a dyn PriceSource,
    config: &'a EngineConfig,
}

impl<'a> Estimator<'a> {
    pub fn new(
        rpc: &'a dyn LedgerRpc,
        prices: &'a dyn PriceSource,
        config: &'a EngineConfig,
    ) -> Self {
        Self { rpc, prices, config }
    }

    pub async fn estimate(&self, request: &EstimateRequest) -> EstimateResult {
        let policy = self.config.policy;

        log::info!("📡 Fetching current validated ledger...");
        let Some(current) = fetch_snapshot(self.rpc, LedgerIndex::Validated).await else {
            log::error!("❌ Cannot fetch current validated ledger; result marked fallback");
            return EstimateResult::fallback(request, policy);
        };
        log::info!(
            "   #{} supply={:.6} XRP",
            current.sequence,
            current.total_supply()
        );

        let mut result = EstimateResult::empty(request, policy);
        result.current_sequence = Some(current.sequence);
        result.baseline_for_next = Some(current.total_supply_drops);

        log::info!("🔍 Resolving window start {}", request.window_start);
        let resolver = SnapshotResolver::new(self.rpc, self.config.resolver.clone());
        let start = resolver
            .resolve_window_start(request.window_start, &current, request.cached_baseline)
            .await;

        if let Some(start) = &start {
            result.start_sequence = start.sequence;
            result.start_source = Some(start.source);
            result.burn_amount = burn_between(start.supply_drops, current.total_supply_drops);
            result.burn_rate = result
                .burn_amount
                .zip(measured_hours(start, &current))
                .map(|(burn, hours)| BurnRate::from_elapsed(burn, hours));
            result.observed_cadence_secs = observed_cadence(start, &current);
            if result.burn_amount.is_none() {
                log::warn!("Supply did not decrease over the window; burn unavailable");
            }
        }

        let reference_ledgers = self.reference_ledgers(start.as_ref(), &current);
        result.reference_ledgers = Some(reference_ledgers);

        log::info!("🧮 Sampling {} ledgers...", self.config.sampler.sample_size);
        let sampler = TransactionSampler::new(self.rpc, self.config.sampler.throttle);
        let window = sampler
            .sample(current.sequence, self.config.sampler.sample_size)
            .await;
        result.sample_ledgers_requested = window.ledgers_requested;
        result.sample_ledgers_fetched = window.ledgers_fetched;
        result.aggregate = aggregate(
            &window,
            reference_ledgers,
            &policy,
            self.config.max_payment_xrp,
        );

        match self.prices.quote().await {
            Ok(quote) => apply_quote(&mut result, quote),
            Err(e) => log::warn!("⚠️  No price quote, fiat figures unavailable: {}", e),
        }

        result
    }

    /// Ledgers elapsed in the resolved window, or the configured daily count
    fn reference_ledgers(&self, start: Option<&WindowStart>, current: &LedgerSnapshot) -> u64 {
        match start.and_then(|s| s.sequence) {
            Some(start_seq) if start_seq <= current.sequence => current.sequence - start_seq,
            _ => {
                log::info!(
                    "Window start sequence unknown; scaling to {} ledgers/day",
                    self.config.ledgers_per_day
                );
                self.config.ledgers_per_day
            }
        }
    }
}

/// Hours between the start and current supply readings
fn measured_hours(start: &WindowStart, current: &LedgerSnapshot) -> Option<f64> {
    let secs = (current.close_time? - start.close_time?).num_milliseconds() as f64 / 1000.0;
    Some(secs / 3600.0)
}

fn observed_cadence(start: &WindowStart, current: &LedgerSnapshot) -> Option<f64> {
    let ledgers = current.sequence.checked_sub(start.sequence?).filter(|n| *n > 0)?;
    let secs = (current.close_time? - start.close_time?).num_milliseconds() as f64 / 1000.0;
    Some(secs / ledgers as f64)
}

fn apply_quote(result: &mut EstimateResult, quote: PriceQuote) {
    result.price = Some(quote.price);
    result.exchange_volume_24h_fiat = quote.volume_24h;
    result.settlement_value_fiat = result
        .aggregate
        .settlement_volume_estimate
        .map(|volume| volume * quote.price);

    if let Some(value) = result.settlement_value_fiat {
        result.category_value_fiat = result
            .aggregate
            .category_shares
            .iter()
            .map(|(category, share)| (*category, value * share))
            .collect();
    }
}
