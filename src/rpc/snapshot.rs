//! Ledger snapshot normalization
//!
//! Node responses carry the ledger object either directly under `ledger` or
//! nested under `closed.ledger`, and spell the sequence as `ledger_index` or
//! `seqNum`. Numbers arrive as JSON numbers or numeric strings depending on the
//! server version. Everything here returns `None` rather than an error when a
//! field is unusable.

use super::{LedgerIndex, LedgerRpc};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Seconds between the Unix epoch and the Ripple epoch (2000-01-01T00:00:00Z)
pub const RIPPLE_EPOCH_OFFSET: i64 = 946_684_800;

/// Drops per XRP
pub const DROPS_PER_XRP: f64 = 1_000_000.0;

pub fn drops_to_xrp(drops: u64) -> f64 {
    drops as f64 / DROPS_PER_XRP
}

/// Point-in-time ledger state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub sequence: u64,
    /// Total XRP in existence, in drops
    pub total_supply_drops: u64,
    pub close_time: Option<DateTime<Utc>>,
}

impl LedgerSnapshot {
    /// Total supply in XRP
    pub fn total_supply(&self) -> f64 {
        drops_to_xrp(self.total_supply_drops)
    }
}

/// Read an unsigned integer that may be encoded as a number or a string
pub(crate) fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Normalize a `ledger` result into a snapshot
///
/// Returns `None` when there is no ledger object, no sequence, or no
/// `total_coins`. A missing `close_time` is kept as `None` on the snapshot.
pub fn parse_snapshot(result: &Value) -> Option<LedgerSnapshot> {
    let ledger = result
        .get("ledger")
        .or_else(|| result.get("closed").and_then(|c| c.get("ledger")))
        .filter(|l| l.is_object())?;

    let sequence = ledger
        .get("ledger_index")
        .and_then(value_as_u64)
        .or_else(|| ledger.get("seqNum").and_then(value_as_u64))
        .or_else(|| result.get("ledger_index").and_then(value_as_u64))
        .filter(|seq| *seq > 0)?;

    let total_supply_drops = ledger.get("total_coins").and_then(value_as_u64)?;

    let close_time = ledger
        .get("close_time")
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs + RIPPLE_EPOCH_OFFSET, 0));

    Some(LedgerSnapshot {
        sequence,
        total_supply_drops,
        close_time,
    })
}

/// Fetch a ledger header and normalize it
pub async fn fetch_snapshot(rpc: &dyn LedgerRpc, index: LedgerIndex) -> Option<LedgerSnapshot> {
    let params = json!({
        "ledger_index": index.to_param(),
        "transactions": false,
    });

    match rpc.call("ledger", params).await {
        Ok(result) => {
            let snapshot = parse_snapshot(&result);
            if snapshot.is_none() {
                log::debug!("Ledger {:?} response has no usable snapshot", index);
            }
            snapshot
        }
        Err(e) => {
            log::warn!("Could not fetch ledger {:?}: {}", index, e);
            None
        }
    }
}

/// Fetch the expanded transaction list of one ledger
///
/// `None` when the fetch fails or the ledger carries no transactions.
pub async fn fetch_transactions(rpc: &dyn LedgerRpc, sequence: u64) -> Option<Vec<Value>> {
    let params = json!({
        "ledger_index": sequence,
        "transactions": true,
        "expand": true,
    });

    let mut result = match rpc.call("ledger", params).await {
        Ok(result) => result,
        Err(e) => {
            log::debug!("Skipping ledger #{}: {}", sequence, e);
            return None;
        }
    };

    let ledger = if result.get("ledger").is_some() {
        result.get_mut("ledger")
    } else {
        result.get_mut("closed").and_then(|c| c.get_mut("ledger"))
    };

    match ledger.and_then(|l| l.get_mut("transactions")).map(Value::take) {
        Some(Value::Array(txs)) if !txs.is_empty() => Some(txs),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_direct_ledger_shape() {
        let result = json!({
            "ledger": {
                "ledger_index": "86000000",
                "total_coins": "99986000000000000",
                "close_time": 780_000_000
            },
            "status": "success"
        });

        let snapshot = parse_snapshot(&result).unwrap();
        assert_eq!(snapshot.sequence, 86_000_000);
        assert_eq!(snapshot.total_supply_drops, 99_986_000_000_000_000);
        assert_eq!(snapshot.total_supply(), 99_986_000_000.0);
        assert_eq!(
            snapshot.close_time.unwrap().timestamp(),
            780_000_000 + RIPPLE_EPOCH_OFFSET
        );
    }

    #[test]
    fn test_parse_closed_ledger_shape() {
        let result = json!({
            "closed": {
                "ledger": {
                    "seqNum": "1234",
                    "total_coins": "100000000",
                    "close_time": 0
                }
            }
        });

        let snapshot = parse_snapshot(&result).unwrap();
        assert_eq!(snapshot.sequence, 1234);
        assert_eq!(snapshot.total_supply(), 100.0);
        assert_eq!(snapshot.close_time.unwrap().timestamp(), RIPPLE_EPOCH_OFFSET);
    }

    #[test]
    fn test_parse_top_level_sequence_fallback() {
        let result = json!({
            "ledger_index": 77,
            "ledger": { "total_coins": 5_000_000 }
        });

        let snapshot = parse_snapshot(&result).unwrap();
        assert_eq!(snapshot.sequence, 77);
        assert_eq!(snapshot.total_supply_drops, 5_000_000);
        assert!(snapshot.close_time.is_none());
    }

    #[test]
    fn test_parse_missing_supply_is_none() {
        let result = json!({
            "ledger": { "ledger_index": 10, "close_time": 100 }
        });
        assert!(parse_snapshot(&result).is_none());

        assert!(parse_snapshot(&json!({})).is_none());
        assert!(parse_snapshot(&json!({ "ledger": "not an object" })).is_none());
    }

    #[test]
    fn test_sequence_priority() {
        // ledger_index wins over seqNum and the top-level value
        let result = json!({
            "ledger_index": 3,
            "ledger": { "ledger_index": 1, "seqNum": 2, "total_coins": "1" }
        });
        assert_eq!(parse_snapshot(&result).unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn test_fetch_helpers_against_mock() {
        use crate::rpc::mock::MockLedger;

        let ledger = MockLedger::linear(100, 110, 3.5);
        let snapshot = fetch_snapshot(&ledger, LedgerIndex::Validated).await.unwrap();
        assert_eq!(snapshot.sequence, 110);

        let txs = fetch_transactions(&ledger, 105).await.unwrap();
        assert!(!txs.is_empty());

        assert!(fetch_snapshot(&ledger, LedgerIndex::Sequence(5)).await.is_none());
        assert!(fetch_transactions(&ledger, 5).await.is_none());
    }
}
