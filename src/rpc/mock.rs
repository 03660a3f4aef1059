//! In-memory ledger for unit tests

use super::snapshot::RIPPLE_EPOCH_OFFSET;
use super::{LedgerRpc, RpcError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Ripple-epoch close time of the first ledger in `MockLedger::linear`
pub const MOCK_BASE_CLOSE: i64 = 780_000_000;

/// Starting supply in drops
pub const MOCK_BASE_SUPPLY: u64 = 99_990_000_000_000_000;

#[derive(Debug, Clone)]
pub struct MockLedgerEntry {
    pub close_time: Option<i64>,
    pub total_coins: Option<u64>,
    pub transactions: Vec<Value>,
}

pub struct MockLedger {
    pub ledgers: BTreeMap<u64, MockLedgerEntry>,
    pub validated: u64,
    pub unreachable: bool,
    calls: AtomicUsize,
}

impl MockLedger {
    /// Ledgers `first..=last`, one every `cadence` seconds, burning 12 drops each
    pub fn linear(first: u64, last: u64, cadence: f64) -> Self {
        let ledgers = (first..=last)
            .map(|seq| {
                let offset = seq - first;
                let entry = MockLedgerEntry {
                    close_time: Some(MOCK_BASE_CLOSE + (offset as f64 * cadence).round() as i64),
                    total_coins: Some(MOCK_BASE_SUPPLY - offset * 12),
                    transactions: default_transactions(),
                };
                (seq, entry)
            })
            .collect();

        Self {
            ledgers,
            validated: last,
            unreachable: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn close_time_of(&self, seq: u64) -> DateTime<Utc> {
        let secs = self.ledgers[&seq].close_time.expect("close time");
        DateTime::from_timestamp(secs + RIPPLE_EPOCH_OFFSET, 0).expect("valid time")
    }

    pub fn entry_mut(&mut self, seq: u64) -> &mut MockLedgerEntry {
        self.ledgers.get_mut(&seq).expect("ledger exists")
    }
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let unavailable = || RpcError::AllNodesFailed {
            method: method.to_string(),
            nodes: 1,
        };

        if self.unreachable || method != "ledger" {
            return Err(unavailable());
        }

        let seq = match &params["ledger_index"] {
            Value::String(s) if s == "validated" => self.validated,
            Value::Number(n) => n.as_u64().ok_or_else(unavailable)?,
            _ => return Err(unavailable()),
        };

        let entry = self.ledgers.get(&seq).ok_or_else(unavailable)?;

        let mut ledger = json!({ "ledger_index": seq.to_string() });
        if let Some(coins) = entry.total_coins {
            ledger["total_coins"] = Value::from(coins.to_string());
        }
        if let Some(close) = entry.close_time {
            ledger["close_time"] = Value::from(close);
        }
        if params["transactions"].as_bool().unwrap_or(false) {
            ledger["transactions"] = Value::Array(entry.transactions.clone());
        }

        Ok(json!({ "ledger": ledger, "status": "success" }))
    }
}

pub fn payment(drops: u64) -> Value {
    json!({
        "TransactionType": "Payment",
        "Fee": "12",
        "Amount": drops.to_string(),
        "metaData": { "TransactionResult": "tesSUCCESS" }
    })
}

pub fn issued_payment() -> Value {
    json!({
        "TransactionType": "Payment",
        "Fee": "12",
        "Amount": { "currency": "USD", "issuer": "rIssuer", "value": "100" },
        "metaData": { "TransactionResult": "tesSUCCESS" }
    })
}

pub fn simple_tx(tx_type: &str) -> Value {
    json!({
        "TransactionType": tx_type,
        "Fee": "10",
        "meta": { "TransactionResult": "tesSUCCESS" }
    })
}

pub fn failed_tx(tx_type: &str) -> Value {
    json!({
        "TransactionType": tx_type,
        "Fee": "10",
        "metaData": { "TransactionResult": "tecUNFUNDED_PAYMENT" }
    })
}

/// Two native payments, one offer, one AccountSet
pub fn default_transactions() -> Vec<Value> {
    vec![
        payment(1_000_000),
        payment(3_000_000),
        simple_tx("OfferCreate"),
        simple_tx("AccountSet"),
    ]
}
