//! XRPL JSON-RPC access
//!
//! `LedgerRpc` is the seam between the estimator and the network: the
//! production implementation is [`RpcGateway`] (ordered node failover over
//! HTTP), tests substitute an in-memory ledger.
//!
//! ## Module Organization
//!
//! - `gateway` - node pool failover over reqwest
//! - `snapshot` - ledger response normalization and fetch helpers

pub mod gateway;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use serde_json::Value;

pub use gateway::RpcGateway;
pub use snapshot::{fetch_snapshot, fetch_transactions, parse_snapshot, LedgerSnapshot};

#[derive(Debug)]
pub enum RpcError {
    /// HTTP client could not be constructed
    Client(reqwest::Error),
    /// Every node in the pool failed for this call
    AllNodesFailed { method: String, nodes: usize },
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        RpcError::Client(err)
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::Client(e) => write!(f, "HTTP client error: {}", e),
            RpcError::AllNodesFailed { method, nodes } => {
                write!(f, "{} failed on all {} node(s)", method, nodes)
            }
        }
    }
}

impl std::error::Error for RpcError {}

/// Ledger selector for the `ledger` method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerIndex {
    /// Most recent validated ledger
    Validated,
    Sequence(u64),
}

impl LedgerIndex {
    pub fn to_param(self) -> Value {
        match self {
            LedgerIndex::Validated => Value::from("validated"),
            LedgerIndex::Sequence(seq) => Value::from(seq),
        }
    }
}

/// A logical JSON-RPC call against the ledger network
///
/// Returns the `result` object of a successful response.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}
