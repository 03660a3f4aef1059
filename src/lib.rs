//! burnflow - daily XRPL network metrics estimator
//!
//! Estimates, for one calendar-day window, how much XRP was destroyed, how
//! many transactions ran by category, and how much value was settled, by
//! combining a few ledger snapshots with a small transaction sample.
//!
//! ## Architecture
//!
//! ```text
//! rpc (gateway failover → snapshot reader)
//!     ├─→ resolver (time → ledger, window start fallback chain)
//!     └─→ sampler (recent ledgers → classified transactions)
//!              ↓
//!         aggregator (sample → whole-window estimates)
//!              ↓
//! price ──→ estimator (one EstimateResult per run)
//!              ↓
//!         history / report
//! ```
//!
//! ## Module Organization
//!
//! - `config` - environment-driven engine settings
//! - `rpc` - JSON-RPC node pool and ledger snapshot parsing
//! - `resolver` - estimate-and-correct search for the window start ledger
//! - `category` - static transaction type → category table
//! - `sampler` - recent-ledger transaction sampling
//! - `aggregator` - scaling and aggregation policies
//! - `price` - fiat price source
//! - `estimator` - orchestration and fallback decisions
//! - `history` - rolling daily JSON history
//! - `report` - plain-text summary

pub mod aggregator;
pub mod category;
pub mod config;
pub mod estimator;
pub mod history;
pub mod price;
pub mod report;
pub mod resolver;
pub mod rpc;
pub mod sampler;

pub use aggregator::{AggregateEstimate, AggregationPolicy};
pub use category::TxCategory;
pub use config::{ConfigError, EngineConfig};
pub use estimator::{EstimateRequest, EstimateResult, Estimator};
pub use price::{CoinGeckoPriceSource, FixedPrice, PriceQuote, PriceSource};
pub use rpc::{LedgerRpc, LedgerSnapshot, RpcError, RpcGateway};
