//! Exchange-rate providers.
//!
//! Two interchangeable ticker APIs are supported; which one is primary
//! is configuration. [`FallbackRateSource`] composes any two sources so
//! a provider outage degrades to the alternate instead of failing the
//! payment session.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use url::Url;

/// Errors from a rate lookup. All of them mean "no usable rate right
/// now"; the payment session leaves the order pending and the caller
/// retries initiation later.
#[derive(Debug, Error)]
pub enum RateError {
    #[error("rate request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("rate response malformed: {0}")]
    Malformed(String),

    #[error("rate unavailable: {0}")]
    Unavailable(String),
}

/// A source of the current EUR-per-BTC exchange rate.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn eur_per_btc(&self) -> Result<Decimal, RateError>;
}

/// Which ticker API to use as the primary rate source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateProviderKind {
    BlockchainTicker,
    CoinDesk,
}

fn positive(rate: Decimal, provider: &str) -> Result<Decimal, RateError> {
    if rate > Decimal::ZERO {
        Ok(rate)
    } else {
        Err(RateError::Malformed(format!(
            "{provider} returned non-positive rate {rate}"
        )))
    }
}

// ---------------------------------------------------------------------------
// blockchain.info ticker
// ---------------------------------------------------------------------------

/// `GET {base}/ticker` -> `{"EUR": {"buy": 123.45, ...}, ...}`.
pub struct BlockchainTickerSource {
    http: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, serde::Deserialize)]
struct BlockchainTickerResponse {
    #[serde(rename = "EUR")]
    eur: Option<BlockchainTickerEntry>,
}

#[derive(Debug, serde::Deserialize)]
struct BlockchainTickerEntry {
    buy: Decimal,
}

impl BlockchainTickerSource {
    pub fn new(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }
}

#[async_trait]
impl RateSource for BlockchainTickerSource {
    async fn eur_per_btc(&self) -> Result<Decimal, RateError> {
        let url = self
            .base_url
            .join("ticker")
            .map_err(|e| RateError::Malformed(format!("bad ticker URL: {e}")))?;
        let response: BlockchainTickerResponse =
            self.http.get(url).send().await?.error_for_status()?.json().await?;
        let entry = response
            .eur
            .ok_or_else(|| RateError::Unavailable("ticker has no EUR entry".into()))?;
        positive(entry.buy, "blockchain ticker")
    }
}

// ---------------------------------------------------------------------------
// CoinDesk BPI
// ---------------------------------------------------------------------------

/// `GET {base}/v1/bpi/currentprice/EUR.json` ->
/// `{"bpi": {"EUR": {"rate_float": 123.45}}}`.
pub struct CoinDeskSource {
    http: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, serde::Deserialize)]
struct CoinDeskResponse {
    bpi: CoinDeskBpi,
}

#[derive(Debug, serde::Deserialize)]
struct CoinDeskBpi {
    #[serde(rename = "EUR")]
    eur: Option<CoinDeskEntry>,
}

#[derive(Debug, serde::Deserialize)]
struct CoinDeskEntry {
    rate_float: Decimal,
}

impl CoinDeskSource {
    pub fn new(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }
}

#[async_trait]
impl RateSource for CoinDeskSource {
    async fn eur_per_btc(&self) -> Result<Decimal, RateError> {
        let url = self
            .base_url
            .join("v1/bpi/currentprice/EUR.json")
            .map_err(|e| RateError::Malformed(format!("bad BPI URL: {e}")))?;
        let response: CoinDeskResponse =
            self.http.get(url).send().await?.error_for_status()?.json().await?;
        let entry = response
            .bpi
            .eur
            .ok_or_else(|| RateError::Unavailable("BPI has no EUR entry".into()))?;
        positive(entry.rate_float, "coindesk")
    }
}

// ---------------------------------------------------------------------------
// Fallback composition
// ---------------------------------------------------------------------------

/// Ask the primary source, fall back to the secondary when it errors.
pub struct FallbackRateSource {
    primary: Box<dyn RateSource>,
    secondary: Box<dyn RateSource>,
}

impl FallbackRateSource {
    pub fn new(primary: Box<dyn RateSource>, secondary: Box<dyn RateSource>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl RateSource for FallbackRateSource {
    async fn eur_per_btc(&self) -> Result<Decimal, RateError> {
        match self.primary.eur_per_btc().await {
            Ok(rate) => Ok(rate),
            Err(primary_err) => {
                tracing::warn!(
                    error = %primary_err,
                    "primary rate source failed, trying fallback"
                );
                self.secondary.eur_per_btc().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn blockchain_ticker_shape_parses() {
        let json = r#"{"USD": {"buy": 104.2, "sell": 104.1, "symbol": "$"},
                       "EUR": {"buy": 79.91, "sell": 79.88, "symbol": "€"}}"#;
        let parsed: BlockchainTickerResponse = serde_json::from_str(json).expect("parses");
        let eur = parsed.eur.expect("EUR entry");
        assert_eq!(eur.buy, "79.91".parse::<Decimal>().expect("decimal"));
    }

    #[test]
    fn coindesk_shape_parses() {
        let json = r#"{"time": {"updated": "now"},
                       "bpi": {"EUR": {"code": "EUR", "rate_float": 412.55}}}"#;
        let parsed: CoinDeskResponse = serde_json::from_str(json).expect("parses");
        let eur = parsed.bpi.eur.expect("EUR entry");
        assert!(eur.rate_float > Decimal::ZERO);
    }

    struct Fixed(Decimal);
    #[async_trait]
    impl RateSource for Fixed {
        async fn eur_per_btc(&self) -> Result<Decimal, RateError> {
            Ok(self.0)
        }
    }

    struct Down;
    #[async_trait]
    impl RateSource for Down {
        async fn eur_per_btc(&self) -> Result<Decimal, RateError> {
            Err(RateError::Unavailable("down for maintenance".into()))
        }
    }

    #[tokio::test]
    async fn fallback_covers_primary_outage() {
        let rate = Decimal::from(400);
        let source = FallbackRateSource::new(Box::new(Down), Box::new(Fixed(rate)));
        assert_eq!(source.eur_per_btc().await.ok(), Some(rate));
    }

    #[tokio::test]
    async fn fallback_reports_double_outage() {
        let source = FallbackRateSource::new(Box::new(Down), Box::new(Down));
        assert!(source.eur_per_btc().await.is_err());
    }

    #[tokio::test]
    async fn fallback_prefers_primary() {
        let source = FallbackRateSource::new(
            Box::new(Fixed(Decimal::from(400))),
            Box::new(Fixed(Decimal::from(500))),
        );
        assert_eq!(source.eur_per_btc().await.ok(), Some(Decimal::from(400)));
    }
}
