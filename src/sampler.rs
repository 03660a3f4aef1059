//! Recent-ledger transaction sampling
//!
//! Walks backward from a start sequence, fetching each ledger with expanded
//! transactions, and keeps only `tesSUCCESS` transactions. A ledger that fails
//! to load (or loads empty) is skipped and does not count as fetched, so the
//! aggregator scales by what was actually observed.

use crate::category::{classify, CategoryCounts, TxCategory};
use crate::rpc::snapshot::{drops_to_xrp, fetch_transactions, value_as_u64};
use crate::rpc::LedgerRpc;
use serde_json::Value;
use std::time::Duration;

/// The only result code admitted into a sample
pub const SUCCESS_CODE: &str = "tesSUCCESS";

/// One successful transaction as seen by the sampler
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub tx_type: String,
    pub result_code: String,
    pub category: TxCategory,
    pub fee_drops: u64,
    /// Native XRP moved by a `Payment`; `None` for issued currencies and other types
    pub transferred_amount: Option<f64>,
}

/// Parse one expanded transaction
///
/// Returns `None` for non-object entries and for anything that did not succeed.
/// Accepts both the flat API v1 shape and the API v2 `tx_json` envelope.
pub fn parse_transaction(tx: &Value) -> Option<TransactionRecord> {
    if !tx.is_object() {
        return None;
    }
    let body = tx.get("tx_json").filter(|b| b.is_object()).unwrap_or(tx);

    let result_code = tx
        .get("metaData")
        .or_else(|| tx.get("meta"))
        .and_then(|meta| meta.get("TransactionResult"))
        .and_then(Value::as_str)
        .unwrap_or(SUCCESS_CODE);
    if result_code != SUCCESS_CODE {
        return None;
    }

    let tx_type = body
        .get("TransactionType")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let fee_drops = body.get("Fee").and_then(value_as_u64).unwrap_or(0);

    // Native amounts are strings of drops; issued currencies are objects
    let transferred_amount = if tx_type == "Payment" {
        body.get("Amount")
            .or_else(|| body.get("DeliverMax"))
            .and_then(Value::as_str)
            .and_then(|drops| drops.parse::<u64>().ok())
            .map(drops_to_xrp)
    } else {
        None
    };

    Some(TransactionRecord {
        tx_type: tx_type.to_string(),
        result_code: result_code.to_string(),
        category: classify(tx_type),
        fee_drops,
        transferred_amount,
    })
}

/// Raw observations from a sampling pass
#[derive(Debug, Clone, Default)]
pub struct SampleWindow {
    pub ledgers_requested: u64,
    pub ledgers_fetched: u64,
    pub transactions: Vec<TransactionRecord>,
    pub fee_total_drops: u64,
    pub category_counts: CategoryCounts,
    /// Successful transactions per fetched ledger
    pub per_ledger_counts: Vec<u64>,
}

impl SampleWindow {
    pub fn new(ledgers_requested: u64) -> Self {
        Self {
            ledgers_requested,
            ..Default::default()
        }
    }

    /// Fold one ledger's transaction list into the window
    pub fn add_ledger(&mut self, transactions: &[Value]) {
        let mut ledger_count = 0;

        for record in transactions.iter().filter_map(parse_transaction) {
            self.category_counts.record(record.category);
            self.fee_total_drops += record.fee_drops;
            ledger_count += 1;
            self.transactions.push(record);
        }

        self.ledgers_fetched += 1;
        self.per_ledger_counts.push(ledger_count);
    }

    pub fn total_sampled(&self) -> u64 {
        self.category_counts.total()
    }

    /// Native payment amounts in observation order
    pub fn transferred_amounts(&self) -> Vec<f64> {
        self.transactions
            .iter()
            .filter_map(|t| t.transferred_amount)
            .collect()
    }

    pub fn avg_tx_per_ledger(&self) -> Option<f64> {
        if self.per_ledger_counts.is_empty() {
            return None;
        }
        let total: u64 = self.per_ledger_counts.iter().sum();
        Some(total as f64 / self.per_ledger_counts.len() as f64)
    }
}

pub struct TransactionSampler<'a> {
    rpc: &'a dyn LedgerRpc,
    throttle: Duration,
}

impl<'a> TransactionSampler<'a> {
    pub fn new(rpc: &'a dyn LedgerRpc, throttle: Duration) -> Self {
        Self { rpc, throttle }
    }

    /// Sample `count` ledgers ending at `start_sequence` (inclusive, walking backward)
    pub async fn sample(&self, start_sequence: u64, count: u64) -> SampleWindow {
        let mut window = SampleWindow::new(count);

        for offset in 0..count {
            let Some(sequence) = start_sequence.checked_sub(offset).filter(|s| *s > 0) else {
                break;
            };

            if offset > 0 && !self.throttle.is_zero() {
                tokio::time::sleep(self.throttle).await;
            }

            match fetch_transactions(self.rpc, sequence).await {
                Some(txs) => window.add_ledger(&txs),
                None => log::debug!("Ledger #{} skipped (no transactions)", sequence),
            }
        }

        log::info!(
            "✅ Sampled {}/{} ledgers, {} txs, {:.6} XRP fees",
            window.ledgers_fetched,
            window.ledgers_requested,
            window.total_sampled(),
            drops_to_xrp(window.fee_total_drops)
        );

        window
    }
}
