//! Engine configuration from environment variables
//!
//! Every empirical constant the estimator relies on (ledger cadence, ledgers per
//! day, sample size, resolver budget) lives here instead of in the algorithms,
//! so a deployment can retune them without a rebuild.

use crate::aggregator::AggregationPolicy;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Public XRPL JSON-RPC nodes, tried in order
pub const DEFAULT_NODES: &[&str] = &[
    "https://xrplcluster.com",
    "https://s1.ripple.com:51234",
    "https://s2.ripple.com:51234",
];

pub const DEFAULT_PRICE_API_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Snapshot resolver tuning
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Average seconds between ledger closes
    pub cadence_secs: f64,
    /// Search attempts before settling for the best snapshot seen
    pub max_attempts: u32,
    /// A correction smaller than this (in ledgers) counts as converged
    pub convergence_threshold: i64,
    /// Ledgers to step after a failed fetch
    pub nudge_step: i64,
    /// Distance behind the current ledger used when the search finds nothing
    pub fallback_offset_ledgers: u64,
    /// Upper bound on a believable burn between a cached baseline and now (XRP)
    pub max_plausible_burn: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cadence_secs: 3.5,
            max_attempts: 6,
            convergence_threshold: 5,
            nudge_step: 1,
            fallback_offset_ledgers: 25_000,
            max_plausible_burn: 50_000.0,
        }
    }
}

/// Transaction sampler tuning
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Number of most recent ledgers fetched with full transactions
    pub sample_size: u64,
    /// Courtesy pause between ledger fetches
    pub throttle: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_size: 60,
            throttle: Duration::from_millis(30),
        }
    }
}

/// Price API settings
#[derive(Debug, Clone)]
pub struct PriceConfig {
    pub api_url: String,
    pub asset_id: String,
    pub fiat: String,
    pub timeout: Duration,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_PRICE_API_URL.to_string(),
            asset_id: "ripple".to_string(),
            fiat: "usd".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Full estimator configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub nodes: Vec<String>,
    pub rpc_timeout: Duration,
    /// Scale reference used only when the window start sequence is unknown
    pub ledgers_per_day: u64,
    pub resolver: ResolverConfig,
    pub sampler: SamplerConfig,
    pub policy: AggregationPolicy,
    /// Largest single payment (XRP) counted as settlement
    pub max_payment_xrp: f64,
    pub price: PriceConfig,
    /// Offset of the reporting day's timezone (the window starts at local midnight)
    pub window_utc_offset_hours: i32,
    pub history_path: String,
    pub history_keep_days: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            nodes: DEFAULT_NODES.iter().map(|n| n.to_string()).collect(),
            rpc_timeout: Duration::from_secs(15),
            ledgers_per_day: 25_000,
            resolver: ResolverConfig::default(),
            sampler: SamplerConfig::default(),
            policy: AggregationPolicy::default(),
            max_payment_xrp: 10_000_000.0,
            price: PriceConfig::default(),
            window_utc_offset_hours: 8,
            history_path: "data.json".to_string(),
            history_keep_days: 90,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables (all optional):
    /// - `XRPL_NODES` - comma-separated node URLs (default: public cluster + s1/s2)
    /// - `RPC_TIMEOUT_SECS` (default: 15)
    /// - `LEDGER_CADENCE_SECS` (default: 3.5)
    /// - `LEDGERS_PER_DAY` (default: 25000)
    /// - `SAMPLE_LEDGER_COUNT` (default: 60)
    /// - `SAMPLE_THROTTLE_MS` (default: 30)
    /// - `RESOLVER_MAX_ATTEMPTS` (default: 6)
    /// - `RESOLVER_THRESHOLD` (default: 5)
    /// - `RESOLVER_NUDGE` (default: 1)
    /// - `FALLBACK_OFFSET_LEDGERS` (default: 25000)
    /// - `MAX_PLAUSIBLE_BURN_XRP` (default: 50000)
    /// - `AGGREGATION_POLICY` - median | trimmed_mean | capped_sum (default: median)
    /// - `MAX_PAYMENT_XRP` - payment bound for every policy (default: 10000000)
    /// - `PRICE_API_URL`, `PRICE_ASSET_ID`, `PRICE_FIAT`
    /// - `WINDOW_UTC_OFFSET_HOURS` (default: 8)
    /// - `HISTORY_PATH` (default: data.json)
    /// - `HISTORY_KEEP_DAYS` (default: 90)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let nodes = match env::var("XRPL_NODES") {
            Ok(s) => {
                let nodes: Vec<String> = s
                    .split(',')
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect();
                if nodes.is_empty() {
                    return Err(ConfigError::InvalidValue(
                        "XRPL_NODES must list at least one node".to_string(),
                    ));
                }
                for node in &nodes {
                    if !node.starts_with("http://") && !node.starts_with("https://") {
                        return Err(ConfigError::InvalidValue(format!(
                            "node URL must start with http:// or https://, got {}",
                            node
                        )));
                    }
                }
                nodes
            }
            Err(_) => defaults.nodes,
        };

        let cadence_secs: f64 = parse_var("LEDGER_CADENCE_SECS", defaults.resolver.cadence_secs)?;
        if !(cadence_secs > 0.0) {
            return Err(ConfigError::InvalidValue(
                "LEDGER_CADENCE_SECS must be positive".to_string(),
            ));
        }

        let max_payment_xrp: f64 = parse_var("MAX_PAYMENT_XRP", defaults.max_payment_xrp)?;
        if !(max_payment_xrp > 0.0) {
            return Err(ConfigError::InvalidValue(
                "MAX_PAYMENT_XRP must be positive".to_string(),
            ));
        }
        let policy = match env::var("AGGREGATION_POLICY") {
            Ok(name) => AggregationPolicy::from_name(&name).ok_or_else(|| {
                ConfigError::InvalidValue(format!("unknown AGGREGATION_POLICY '{}'", name))
            })?,
            Err(_) => defaults.policy,
        };

        let resolver = ResolverConfig {
            cadence_secs,
            max_attempts: parse_var("RESOLVER_MAX_ATTEMPTS", defaults.resolver.max_attempts)?,
            convergence_threshold: parse_var(
                "RESOLVER_THRESHOLD",
                defaults.resolver.convergence_threshold,
            )?,
            nudge_step: parse_var("RESOLVER_NUDGE", defaults.resolver.nudge_step)?,
            fallback_offset_ledgers: parse_var(
                "FALLBACK_OFFSET_LEDGERS",
                defaults.resolver.fallback_offset_ledgers,
            )?,
            max_plausible_burn: parse_var(
                "MAX_PLAUSIBLE_BURN_XRP",
                defaults.resolver.max_plausible_burn,
            )?,
        };

        let sampler = SamplerConfig {
            sample_size: parse_var("SAMPLE_LEDGER_COUNT", defaults.sampler.sample_size)?,
            throttle: Duration::from_millis(parse_var("SAMPLE_THROTTLE_MS", 30u64)?),
        };

        let price = PriceConfig {
            api_url: env::var("PRICE_API_URL").unwrap_or(defaults.price.api_url),
            asset_id: env::var("PRICE_ASSET_ID").unwrap_or(defaults.price.asset_id),
            fiat: env::var("PRICE_FIAT").unwrap_or(defaults.price.fiat),
            timeout: defaults.price.timeout,
        };

        Ok(Self {
            nodes,
            rpc_timeout: Duration::from_secs(parse_var("RPC_TIMEOUT_SECS", 15u64)?),
            ledgers_per_day: parse_var("LEDGERS_PER_DAY", defaults.ledgers_per_day)?,
            resolver,
            sampler,
            policy,
            max_payment_xrp,
            price,
            window_utc_offset_hours: parse_var(
                "WINDOW_UTC_OFFSET_HOURS",
                defaults.window_utc_offset_hours,
            )?,
            history_path: env::var("HISTORY_PATH").unwrap_or(defaults.history_path),
            history_keep_days: parse_var("HISTORY_KEEP_DAYS", defaults.history_keep_days)?,
        })
    }
}

/// Read an optional variable, falling back to `default` when unset
fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(format!("{} has unparsable value '{}'", name, raw))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env vars are process-global; keep every env-touching assertion in one test
    #[test]
    fn test_config_from_env() {
        // Test: Defaults when nothing is set
        for var in [
            "XRPL_NODES",
            "LEDGER_CADENCE_SECS",
            "SAMPLE_LEDGER_COUNT",
            "AGGREGATION_POLICY",
            "MAX_PAYMENT_XRP",
            "RESOLVER_MAX_ATTEMPTS",
        ] {
            env::remove_var(var);
        }

        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.nodes.len(), 3);
        assert_eq!(config.resolver.cadence_secs, 3.5);
        assert_eq!(config.sampler.sample_size, 60);
        assert_eq!(config.ledgers_per_day, 25_000);
        assert_eq!(config.policy, AggregationPolicy::Median);
        assert_eq!(config.max_payment_xrp, 10_000_000.0);

        // Test: Custom values
        env::set_var("XRPL_NODES", "https://a.example, https://b.example,");
        env::set_var("LEDGER_CADENCE_SECS", "3.9");
        env::set_var("SAMPLE_LEDGER_COUNT", "10");
        env::set_var("AGGREGATION_POLICY", "capped_sum");
        env::set_var("MAX_PAYMENT_XRP", "5000");

        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.nodes, vec!["https://a.example", "https://b.example"]);
        assert_eq!(config.resolver.cadence_secs, 3.9);
        assert_eq!(config.sampler.sample_size, 10);
        assert_eq!(config.policy, AggregationPolicy::CappedSum);
        assert_eq!(config.max_payment_xrp, 5000.0);

        // Test: Rejections
        env::set_var("AGGREGATION_POLICY", "mean");
        assert!(matches!(EngineConfig::from_env(), Err(ConfigError::InvalidValue(_))));
        env::remove_var("AGGREGATION_POLICY");

        env::set_var("MAX_PAYMENT_XRP", "0");
        assert!(EngineConfig::from_env().is_err());
        env::set_var("MAX_PAYMENT_XRP", "5000");

        env::set_var("RESOLVER_MAX_ATTEMPTS", "many");
        assert!(EngineConfig::from_env().is_err());
        env::remove_var("RESOLVER_MAX_ATTEMPTS");

        env::set_var("XRPL_NODES", "ftp://node");
        assert!(EngineConfig::from_env().is_err());

        // Cleanup
        env::remove_var("XRPL_NODES");
        env::remove_var("LEDGER_CADENCE_SECS");
        env::remove_var("SAMPLE_LEDGER_COUNT");
        env::remove_var("MAX_PAYMENT_XRP");
    }
}
