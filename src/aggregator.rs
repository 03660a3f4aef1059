//! Whole-window estimates from a ledger sample
//!
//! The sample covers a few dozen ledgers; everything here projects it onto the
//! full window with `scale = reference_ledgers / ledgers_fetched`. A sample with
//! no fetched ledgers is never scaled and yields an unavailable estimate.
//!
//! Typical payment value is estimated under one `AggregationPolicy`. The
//! policies are not interchangeable: a capped sum still lets a few large
//! payments dominate, the median and trimmed mean ignore them. Every policy is
//! bounded by `max_payment`: the capped sum clamps to it, the median and
//! trimmed mean leave payments above it out entirely (exchange-internal
//! shuffles rather than settlement).

use crate::category::{CategoryCounts, TxCategory};
use crate::rpc::snapshot::drops_to_xrp;
use crate::sampler::SampleWindow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Share of the smallest amounts dropped by the trimmed mean (1 in 10)
const TRIM_LOW_DIVISOR: usize = 10;
/// Share of the largest amounts dropped by the trimmed mean (1 in 100)
const TRIM_HIGH_DIVISOR: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Sum of amounts clamped to the payment bound each, scaled to the window
    CappedSum,
    /// Median amount times the projected settlement count
    Median,
    /// Mean of amounts without the lowest decile and top percentile,
    /// times the projected settlement count
    TrimmedMean,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        AggregationPolicy::Median
    }
}

impl AggregationPolicy {
    /// Parse a configured policy name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "median" => Some(AggregationPolicy::Median),
            "trimmed_mean" | "trimmed" => Some(AggregationPolicy::TrimmedMean),
            "capped_sum" | "capped" => Some(AggregationPolicy::CappedSum),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregationPolicy::CappedSum => "capped_sum",
            AggregationPolicy::Median => "median",
            AggregationPolicy::TrimmedMean => "trimmed_mean",
        }
    }
}

/// Diagnostic distribution of observed payment amounts (XRP)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountPercentiles {
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
    pub samples: usize,
}

impl AmountPercentiles {
    pub fn from_amounts(amounts: &[f64]) -> Option<Self> {
        let sorted = sorted(amounts);
        if sorted.is_empty() {
            return None;
        }
        Some(Self {
            p10: percentile(&sorted, 10.0),
            p50: percentile(&sorted, 50.0),
            p90: percentile(&sorted, 90.0),
            p99: percentile(&sorted, 99.0),
            samples: sorted.len(),
        })
    }
}

/// Window-scaled view of a sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateEstimate {
    pub scale: Option<f64>,
    /// All four categories when anything was observed, empty otherwise
    pub category_shares: BTreeMap<TxCategory, f64>,
    pub category_count_estimates: BTreeMap<TxCategory, f64>,
    pub transaction_count_estimate: Option<f64>,
    pub settlement_count_estimate: Option<f64>,
    /// Native XRP settled over the window under the chosen policy
    pub settlement_volume_estimate: Option<f64>,
    /// Per-payment value the policy settled on (median or trimmed mean)
    pub typical_payment: Option<f64>,
    /// Uncapped payment sum scaled to the window, for comparison only
    pub raw_settlement_sum: Option<f64>,
    /// Fees scaled to the window in XRP; never a substitute for supply-delta burn
    pub fee_burn_estimate: Option<f64>,
    pub percentiles: Option<AmountPercentiles>,
    pub avg_tx_per_ledger: Option<f64>,
}

impl AggregateEstimate {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.scale.is_some()
    }
}

/// Project a sample onto a window of `reference_ledgers` ledgers
///
/// `max_payment` (XRP) bounds individual payments under every policy.
pub fn aggregate(
    window: &SampleWindow,
    reference_ledgers: u64,
    policy: &AggregationPolicy,
    max_payment: f64,
) -> AggregateEstimate {
    if window.ledgers_fetched == 0 {
        log::warn!("No ledgers sampled; window estimate unavailable");
        return AggregateEstimate::unavailable();
    }

    let scale = reference_ledgers as f64 / window.ledgers_fetched as f64;
    let total = window.total_sampled();
    let amounts = window.transferred_amounts();

    let mut estimate = AggregateEstimate {
        scale: Some(scale),
        transaction_count_estimate: Some(total as f64 * scale),
        fee_burn_estimate: Some(drops_to_xrp(window.fee_total_drops) * scale),
        percentiles: AmountPercentiles::from_amounts(&amounts),
        avg_tx_per_ledger: window.avg_tx_per_ledger(),
        ..Default::default()
    };

    if total == 0 {
        log::warn!(
            "{} ledgers sampled but no successful transactions; categories unavailable",
            window.ledgers_fetched
        );
        return estimate;
    }

    estimate.category_shares = category_shares(&window.category_counts);
    estimate.category_count_estimates = window
        .category_counts
        .iter()
        .map(|(category, n)| (category, n as f64 * scale))
        .collect();

    let settlement_count =
        window.category_counts.get(TxCategory::Settlement) as f64 * scale;
    estimate.settlement_count_estimate = Some(settlement_count);
    estimate.raw_settlement_sum = Some(amounts.iter().sum::<f64>() * scale);

    let (typical, volume) = match policy {
        AggregationPolicy::CappedSum => (None, capped_sum(&amounts, max_payment) * scale),
        AggregationPolicy::Median => {
            let typical = median(&within_bound(&amounts, max_payment));
            (typical, typical.unwrap_or(0.0) * settlement_count)
        }
        AggregationPolicy::TrimmedMean => {
            let typical = trimmed_mean(&within_bound(&amounts, max_payment));
            (typical, typical.unwrap_or(0.0) * settlement_count)
        }
    };
    estimate.typical_payment = typical;
    estimate.settlement_volume_estimate = Some(volume);

    estimate
}

/// Fraction of the sample per category; empty when nothing was sampled
pub fn category_shares(counts: &CategoryCounts) -> BTreeMap<TxCategory, f64> {
    let total = counts.total();
    if total == 0 {
        return BTreeMap::new();
    }
    counts
        .iter()
        .map(|(category, n)| (category, n as f64 / total as f64))
        .collect()
}

/// Sum with every amount clamped to `cap`
pub fn capped_sum(amounts: &[f64], cap: f64) -> f64 {
    amounts.iter().map(|a| a.min(cap)).sum()
}

/// Amounts not above `max_payment`
pub fn within_bound(amounts: &[f64], max_payment: f64) -> Vec<f64> {
    amounts.iter().copied().filter(|a| *a <= max_payment).collect()
}

/// Upper median (`sorted[n / 2]`)
pub fn median(amounts: &[f64]) -> Option<f64> {
    let sorted = sorted(amounts);
    sorted.get(sorted.len() / 2).copied()
}

/// Sorted amounts without the lowest decile and the top percentile
pub fn trimmed(amounts: &[f64]) -> Vec<f64> {
    let sorted = sorted(amounts);
    let low = sorted.len() / TRIM_LOW_DIVISOR;
    let high = sorted.len() / TRIM_HIGH_DIVISOR;
    sorted[low..sorted.len() - high].to_vec()
}

pub fn trimmed_mean(amounts: &[f64]) -> Option<f64> {
    let kept = trimmed(amounts);
    if kept.is_empty() {
        return None;
    }
    Some(kept.iter().sum::<f64>() / kept.len() as f64)
}

/// Nearest-rank percentile of an already sorted, non-empty slice
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

fn sorted(amounts: &[f64]) -> Vec<f64> {
    let mut sorted = amounts.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}
