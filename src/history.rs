//! Rolling daily history file
//!
//! One JSON array of `HistoryEntry`, newest last. Each run replaces the entry
//! for its own date, so repeated runs on the same day converge on one row.
//! The stored total supply is what the next day's run uses as its baseline.

use crate::category::TxCategory;
use crate::estimator::EstimateResult;
use crate::rpc::snapshot::{drops_to_xrp, DROPS_PER_XRP};
use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fs, path::Path};

const MILLION: f64 = 1_000_000.0;

#[derive(Debug)]
pub enum HistoryError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl From<std::io::Error> for HistoryError {
    fn from(err: std::io::Error) -> Self {
        HistoryError::Io(err)
    }
}

impl From<serde_json::Error> for HistoryError {
    fn from(err: serde_json::Error) -> Self {
        HistoryError::Serialization(err)
    }
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::Io(e) => write!(f, "history I/O error: {}", e),
            HistoryError::Serialization(e) => write!(f, "history format error: {}", e),
        }
    }
}

impl std::error::Error for HistoryError {}

/// One day of metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    /// Local wall-clock time of the run that wrote this entry
    pub last_updated: String,
    pub burn_xrp: Option<f64>,
    /// On-chain settlement value, fiat millions
    pub load_fiat_m: Option<f64>,
    /// Transaction count, millions
    pub transactions_m: Option<f64>,
    #[serde(default)]
    pub tx_categories: BTreeMap<TxCategory, f64>,
    #[serde(default)]
    pub load_categories: BTreeMap<TxCategory, f64>,
    #[serde(default)]
    pub exchange_volume_24h_fiat_m: Option<f64>,
    pub is_fallback: bool,
    #[serde(default)]
    pub is_partial: bool,
    /// Total supply at the time of the run, for display
    pub total_coins_xrp: Option<f64>,
    /// Exact total supply, baseline for the following day
    #[serde(default)]
    pub total_coins_drops: Option<u64>,
}

impl HistoryEntry {
    /// Summarise a result for the day its window starts on in `tz`
    pub fn from_estimate(result: &EstimateResult, tz: FixedOffset) -> Self {
        let local_now = result.now.with_timezone(&tz);
        let aggregate = &result.aggregate;

        Self {
            date: result.window_start.with_timezone(&tz).date_naive(),
            last_updated: local_now.format("%Y-%m-%d %H:%M:%S").to_string(),
            burn_xrp: result.burn_amount.map(|b| round_to(b, 4)),
            load_fiat_m: result.settlement_value_fiat.map(|v| round_to(v / MILLION, 2)),
            transactions_m: aggregate
                .transaction_count_estimate
                .map(|n| round_to(n / MILLION, 3)),
            tx_categories: aggregate
                .category_count_estimates
                .iter()
                .map(|(category, n)| (*category, round_to(n / MILLION, 4)))
                .collect(),
            load_categories: result
                .category_value_fiat
                .iter()
                .map(|(category, v)| (*category, round_to(v / MILLION, 2)))
                .collect(),
            exchange_volume_24h_fiat_m: result
                .exchange_volume_24h_fiat
                .map(|v| round_to(v / MILLION, 2)),
            is_fallback: result.is_fallback,
            is_partial: result.is_partial,
            total_coins_xrp: result.baseline_for_next.map(drops_to_xrp),
            total_coins_drops: result.baseline_for_next,
        }
    }

    /// Exact supply, or the XRP figure for entries that predate it
    fn supply_drops(&self) -> Option<u64> {
        self.total_coins_drops.or_else(|| {
            self.total_coins_xrp
                .filter(|xrp| xrp.is_finite() && *xrp >= 0.0)
                .map(|xrp| (xrp * DROPS_PER_XRP).round() as u64)
        })
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Load the history file; a missing file is an empty history
pub fn load_history(file_path: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
    if !Path::new(file_path).exists() {
        log::info!("No existing history file found: {}", file_path);
        return Ok(Vec::new());
    }

    let json = fs::read_to_string(file_path)?;
    let entries: Vec<HistoryEntry> = serde_json::from_str(&json)?;

    log::info!("Loaded {} history entries from {}", entries.len(), file_path);
    Ok(entries)
}

pub fn save_history(file_path: &str, entries: &[HistoryEntry]) -> Result<(), HistoryError> {
    let json = serde_json::to_string_pretty(entries)?;
    fs::write(file_path, json)?;

    log::debug!("Saved {} history entries to {}", entries.len(), file_path);
    Ok(())
}

/// Supply (drops) recorded by the most recent run on a different day than `date`
///
/// Entries written before exact drops were stored fall back to the XRP figure.
pub fn previous_baseline(entries: &[HistoryEntry], date: NaiveDate) -> Option<u64> {
    entries
        .iter()
        .rev()
        .filter(|e| e.date != date)
        .find_map(HistoryEntry::supply_drops)
}

/// Replace the entry for `entry.date`, append it, and keep the newest `keep`
pub fn upsert_entry(entries: &mut Vec<HistoryEntry>, entry: HistoryEntry, keep: usize) {
    entries.retain(|e| e.date != entry.date);
    entries.push(entry);

    if entries.len() > keep {
        let excess = entries.len() - keep;
        entries.drain(..excess);
    }
}
