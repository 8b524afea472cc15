//! Shared models for the candle feed.
//!
//! Contains the candle type and its wire formats, the allowed interval set,
//! and the [`FeedConfig`] that identifies one feed.

pub mod candle;
pub mod interval;

pub use candle::Candle;
pub use interval::Interval;

use crate::Result;
use crate::error::FeedError;

/// Largest window the kline endpoint serves in one request.
pub const MAX_BAR_COUNT: u16 = 1500;

/// Symbol used when the host supplies an empty one.
pub const DEFAULT_SYMBOL: &str = "SOLUSDT";

/// Bar count used when the host supplies an unparsable one.
pub const DEFAULT_BAR_COUNT: u16 = 48;

/// Interval used by [`FeedConfig::default`].
pub const DEFAULT_INTERVAL: Interval = Interval::H1;

/// Identifies one feed: which market, how much history, which granularity.
///
/// Any change to any field is a reload, never a patch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedConfig {
    symbol: String,
    bar_count: u16,
    interval: Interval,
}

impl FeedConfig {
    /// Builds a configuration from already-validated values.
    ///
    /// The symbol is upper-cased.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidConfig`] if the symbol is blank or
    /// `bar_count` is outside `1..=1500`.
    pub fn new(symbol: &str, bar_count: u16, interval: Interval) -> Result<Self> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(FeedError::InvalidConfig("symbol must not be empty".to_string()));
        }
        if !(1..=MAX_BAR_COUNT).contains(&bar_count) {
            return Err(FeedError::InvalidConfig(format!(
                "bar count {bar_count} outside 1..={MAX_BAR_COUNT}"
            )));
        }

        Ok(Self {
            symbol,
            bar_count,
            interval,
        })
    }

    /// Builds a configuration from raw host input, coercing every field
    /// into range instead of failing.
    ///
    /// Blank symbols fall back to [`DEFAULT_SYMBOL`], the bar count is
    /// clamped to `1..=1500` and the interval snaps to the nearest allowed
    /// granularity.
    pub fn normalized(symbol: &str, bar_count: i64, interval_minutes: i64) -> Self {
        let symbol = symbol.trim().to_uppercase();
        let symbol = if symbol.is_empty() {
            DEFAULT_SYMBOL.to_string()
        } else {
            symbol
        };

        Self {
            symbol,
            bar_count: bar_count.clamp(1, i64::from(MAX_BAR_COUNT)) as u16,
            interval: Interval::nearest(interval_minutes),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bar_count(&self) -> u16 {
        self.bar_count
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            bar_count: DEFAULT_BAR_COUNT,
            interval: DEFAULT_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uppercases_symbol() {
        let config = FeedConfig::new(" btcusdt ", 100, Interval::M1).unwrap();
        assert_eq!(config.symbol(), "BTCUSDT");
        assert_eq!(config.bar_count(), 100);
        assert_eq!(config.interval(), Interval::M1);
    }

    #[test]
    fn new_rejects_blank_symbol() {
        let err = FeedConfig::new("   ", 10, Interval::M1).unwrap_err();
        assert!(matches!(err, FeedError::InvalidConfig(_)));
    }

    #[test]
    fn new_rejects_bar_count_out_of_range() {
        assert!(FeedConfig::new("BTCUSDT", 0, Interval::M1).is_err());
        assert!(FeedConfig::new("BTCUSDT", 1501, Interval::M1).is_err());
        assert!(FeedConfig::new("BTCUSDT", 1500, Interval::M1).is_ok());
    }

    #[test]
    fn normalized_coerces_everything() {
        let config = FeedConfig::normalized("ethusdt", 5000, 50);
        assert_eq!(config.symbol(), "ETHUSDT");
        assert_eq!(config.bar_count(), 1500);
        assert_eq!(config.interval(), Interval::H1);

        let config = FeedConfig::normalized("", -3, 0);
        assert_eq!(config.symbol(), DEFAULT_SYMBOL);
        assert_eq!(config.bar_count(), 1);
        assert_eq!(config.interval(), Interval::M1);
    }

    #[test]
    fn default_matches_dashboard_defaults() {
        let config = FeedConfig::default();
        assert_eq!(config.symbol(), "SOLUSDT");
        assert_eq!(config.bar_count(), 48);
        assert_eq!(config.interval(), Interval::H1);
    }
}
