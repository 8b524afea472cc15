//! Application configuration loaded from environment variables.
//!
//! Every variable is optional; empty values count as unset:
//! - `KLINEFEED_REST_URL`: bulk kline endpoint base (default `https://fapi.binance.com`)
//! - `KLINEFEED_WS_URL`: kline stream base (default `wss://fstream.binance.com/ws`)
//! - `KLINEFEED_RETRY_SECS`: fixed delay before a dropped stream is resynced (default 5)
//! - `KLINEFEED_SYMBOL`, `KLINEFEED_BARS`, `KLINEFEED_INTERVAL`: the feed to
//!   run, coerced into range by [`FeedConfig::normalized`]

use std::time::Duration;

use crate::feed::{DEFAULT_RETRY_DELAY, FeedOptions};
use crate::models::{DEFAULT_BAR_COUNT, DEFAULT_SYMBOL, FeedConfig};
use crate::rest::DEFAULT_REST_URL;
use crate::websocket::DEFAULT_WS_URL;

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub endpoints: EndpointConfig,
    pub options: FeedOptions,
    pub feed: FeedConfig,
}

/// Where the two data sources live.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub rest_url: String,
    pub websocket_url: String,
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`FeedError::Config`](crate::FeedError::Config) if a numeric
/// variable cannot be parsed or the retry delay is zero.
pub fn fetch_config() -> crate::Result<AppConfig> {
    config_from(non_empty_var)
}

/// Builds the configuration from an arbitrary variable lookup.
///
/// # Errors
///
/// Same as [`fetch_config`].
pub fn config_from<F>(lookup: F) -> crate::Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |name: &str| lookup(name).filter(|s| !s.trim().is_empty());

    let rest_url = lookup("KLINEFEED_REST_URL").unwrap_or_else(|| DEFAULT_REST_URL.to_string());
    let websocket_url = lookup("KLINEFEED_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_string());

    let retry_delay = match lookup("KLINEFEED_RETRY_SECS") {
        Some(raw) => match parse_int("KLINEFEED_RETRY_SECS", &raw)? {
            secs if secs > 0 => Duration::from_secs(secs as u64),
            _ => {
                return Err(crate::FeedError::Config(
                    "KLINEFEED_RETRY_SECS must be positive".to_string(),
                ));
            }
        },
        None => DEFAULT_RETRY_DELAY,
    };

    let symbol = lookup("KLINEFEED_SYMBOL").unwrap_or_else(|| DEFAULT_SYMBOL.to_string());
    let bars = match lookup("KLINEFEED_BARS") {
        Some(raw) => parse_int("KLINEFEED_BARS", &raw)?,
        None => i64::from(DEFAULT_BAR_COUNT),
    };
    let interval = match lookup("KLINEFEED_INTERVAL") {
        Some(raw) => parse_int("KLINEFEED_INTERVAL", &raw)?,
        None => i64::from(crate::models::DEFAULT_INTERVAL.minutes()),
    };

    Ok(AppConfig {
        endpoints: EndpointConfig {
            rest_url,
            websocket_url,
        },
        options: FeedOptions { retry_delay },
        feed: FeedConfig::normalized(&symbol, bars, interval),
    })
}

fn parse_int(name: &str, raw: &str) -> crate::Result<i64> {
    raw.trim()
        .parse()
        .map_err(|e| crate::FeedError::Config(format!("{name}={raw:?} is not an integer: {e}")))
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
