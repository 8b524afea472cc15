//! Bulk historical kline fetches over REST.

use std::future::Future;

use serde_json::Value;
use tracing::debug;

use crate::Result;
use crate::error::FeedError;
use crate::models::{Candle, FeedConfig};

/// Default USDⓈ-M futures REST endpoint.
pub const DEFAULT_REST_URL: &str = "https://fapi.binance.com";

/// Path of the kline window endpoint, relative to the base URL.
const KLINES_PATH: &str = "/fapi/v1/klines";

/// A one-shot source for the most recent window of bars.
///
/// Implementations return candles ascending by time. The feed may abort the
/// returned future at any await point.
pub trait KlineSource: Send + Sync + 'static {
    fn fetch_klines(&self, config: &FeedConfig) -> impl Future<Output = Result<Vec<Candle>>> + Send;
}

/// [`KlineSource`] backed by the Binance futures REST API.
#[derive(Debug, Clone)]
pub struct BinanceRest {
    client: reqwest::Client,
    base_url: String,
}

impl BinanceRest {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Uses a caller-provided client (shared connection pool, custom TLS).
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full endpoint URL, without query parameters.
    pub fn klines_url(&self) -> String {
        format!("{}{KLINES_PATH}", self.base_url.trim_end_matches('/'))
    }
}

impl Default for BinanceRest {
    fn default() -> Self {
        Self::new(DEFAULT_REST_URL)
    }
}

impl KlineSource for BinanceRest {
    async fn fetch_klines(&self, config: &FeedConfig) -> Result<Vec<Candle>> {
        let limit = config.bar_count().to_string();
        debug!(
            symbol = config.symbol(),
            interval = %config.interval(),
            limit = %limit,
            "Requesting klines"
        );

        let response = self
            .client
            .get(self.klines_url())
            .query(&[
                ("symbol", config.symbol()),
                ("interval", config.interval().as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::HttpStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let rows: Vec<Vec<Value>> = response.json().await?;
        parse_klines(&rows)
    }
}

/// Parses a REST kline response body.
///
/// # Errors
///
/// Returns [`FeedError::MalformedMessage`] on the first malformed row.
pub fn parse_klines(rows: &[Vec<Value>]) -> Result<Vec<Candle>> {
    rows.iter().map(|row| Candle::from_rest_row(row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn klines_url_joins_base() {
        let rest = BinanceRest::new("https://fapi.binance.com/");
        assert_eq!(rest.klines_url(), "https://fapi.binance.com/fapi/v1/klines");
        assert_eq!(BinanceRest::default().base_url(), DEFAULT_REST_URL);
    }

    #[test]
    fn parses_body() {
        let body = r#"[
            [1700000040000, "1.0", "2.0", "0.5", "1.5", "10", 1700000099999, "0", 1, "0", "0", "0"],
            [1700000100000, "1.5", "2.5", "1.0", "2.0", "11", 1700000159999, "0", 1, "0", "0", "0"]
        ]"#;
        let rows: Vec<Vec<Value>> = serde_json::from_str(body).unwrap();
        let candles = parse_klines(&rows).unwrap();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].time, 1_700_000_040);
        assert_eq!(candles[1].time, 1_700_000_100);
    }

    #[test]
    fn malformed_row_fails_whole_body() {
        let body = r#"[[1700000040000, "1.0", "2.0", "0.5", "1.5", "10"], [1]]"#;
        let rows: Vec<Vec<Value>> = serde_json::from_str(body).unwrap();
        assert!(parse_klines(&rows).is_err());
    }
}
