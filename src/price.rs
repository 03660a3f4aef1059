//! Price and exchange volume quotes
//!
//! The estimator only needs two scalars: the current fiat price and, when the
//! provider has it, the 24h exchange-reported volume. A failed quote leaves
//! every fiat figure empty; no fallback price is substituted.
//!
//! ## API Reference
//!
//! Endpoint: {api_url}/simple/price?ids={asset}&vs_currencies={fiat}&include_24hr_vol=true
//! Returns: `{"ripple": {"usd": 2.31, "usd_24h_vol": 3141592653.5}}`

use crate::config::PriceConfig;
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub price: f64,
    pub volume_24h: Option<f64>,
}

#[derive(Debug)]
pub enum PriceError {
    Request(reqwest::Error),
    Http(reqwest::StatusCode),
    MissingPrice(String),
}

impl From<reqwest::Error> for PriceError {
    fn from(err: reqwest::Error) -> Self {
        PriceError::Request(err)
    }
}

impl std::fmt::Display for PriceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceError::Request(e) => write!(f, "price request failed: {}", e),
            PriceError::Http(status) => write!(f, "price API error: {}", status),
            PriceError::MissingPrice(what) => write!(f, "price response has no {}", what),
        }
    }
}

impl std::error::Error for PriceError {}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn quote(&self) -> Result<PriceQuote, PriceError>;
}

/// CoinGecko simple-price client
pub struct CoinGeckoPriceSource {
    client: reqwest::Client,
    config: PriceConfig,
}

impl CoinGeckoPriceSource {
    pub fn new(config: PriceConfig) -> Result<Self, PriceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("burnflow/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/simple/price?ids={}&vs_currencies={}&include_24hr_vol=true",
            self.config.api_url.trim_end_matches('/'),
            self.config.asset_id,
            self.config.fiat
        )
    }
}

#[async_trait]
impl PriceSource for CoinGeckoPriceSource {
    async fn quote(&self) -> Result<PriceQuote, PriceError> {
        let response = self.client.get(self.url()).send().await?;

        if !response.status().is_success() {
            return Err(PriceError::Http(response.status()));
        }

        let body: Value = response.json().await?;
        let quote = parse_quote(&body, &self.config.asset_id, &self.config.fiat)?;
        log::info!(
            "✅ {} price: {:.4} {}",
            self.config.asset_id,
            quote.price,
            self.config.fiat.to_uppercase()
        );
        Ok(quote)
    }
}

/// Read `{asset: {fiat: price, fiat_24h_vol: volume}}`
pub fn parse_quote(body: &Value, asset_id: &str, fiat: &str) -> Result<PriceQuote, PriceError> {
    let asset = body
        .get(asset_id)
        .ok_or_else(|| PriceError::MissingPrice(format!("entry for {}", asset_id)))?;

    let price = asset
        .get(fiat)
        .and_then(Value::as_f64)
        .filter(|p| p.is_finite() && *p > 0.0)
        .ok_or_else(|| PriceError::MissingPrice(format!("{} price", fiat)))?;

    let volume_24h = asset
        .get(format!("{}_24h_vol", fiat))
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite() && *v >= 0.0);

    Ok(PriceQuote { price, volume_24h })
}

/// A quote that never changes, for offline runs
pub struct FixedPrice(pub PriceQuote);

#[async_trait]
impl PriceSource for FixedPrice {
    async fn quote(&self) -> Result<PriceQuote, PriceError> {
        Ok(self.0)
    }
}
