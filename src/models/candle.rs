//! OHLC candle models and the exchange's kline wire formats.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;
use crate::error::FeedError;

/// A single OHLC bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time, seconds since the Unix epoch.
    pub time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Option<Decimal>,
}

impl Candle {
    /// Parses one row of the REST kline response.
    ///
    /// Rows look like `[openTimeMs, "open", "high", "low", "close", "volume", ...]`;
    /// trailing fields are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::MalformedMessage`] if the row is too short or a
    /// field has the wrong type.
    pub fn from_rest_row(row: &[Value]) -> Result<Self> {
        if row.len() < 6 {
            return Err(FeedError::MalformedMessage(format!(
                "kline row has {} fields, expected at least 6",
                row.len()
            )));
        }

        let open_time_ms = row[0].as_i64().ok_or_else(|| {
            FeedError::MalformedMessage(format!("kline open time is not an integer: {}", row[0]))
        })?;

        Ok(Self {
            time: open_time_ms.div_euclid(1000),
            open: decimal_field(&row[1], "open")?,
            high: decimal_field(&row[2], "high")?,
            low: decimal_field(&row[3], "low")?,
            close: decimal_field(&row[4], "close")?,
            volume: Some(decimal_field(&row[5], "volume")?),
        })
    }
}

/// Reads a price/quantity that the exchange encodes as a decimal string
/// (plain JSON numbers are accepted as well).
fn decimal_field(value: &Value, name: &str) -> Result<Decimal> {
    let parsed = match value {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    };
    parsed.ok_or_else(|| FeedError::MalformedMessage(format!("invalid {name}: {value}")))
}

/// A `kline` event pushed on a `<symbol>@kline_<interval>` stream.
#[derive(Debug, Clone, Deserialize)]
pub struct KlineEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    /// Event time in milliseconds.
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "k")]
    pub kline: KlineData,
}

/// The bar carried by a [`KlineEvent`].
#[derive(Debug, Clone, Deserialize)]
pub struct KlineData {
    /// Bar open time in milliseconds.
    #[serde(rename = "t")]
    pub open_time: i64,
    /// Bar close time in milliseconds.
    #[serde(rename = "T", default)]
    pub close_time: i64,
    #[serde(rename = "i", default)]
    pub interval: String,
    #[serde(rename = "o")]
    pub open: Decimal,
    #[serde(rename = "h")]
    pub high: Decimal,
    #[serde(rename = "l")]
    pub low: Decimal,
    #[serde(rename = "c")]
    pub close: Decimal,
    #[serde(rename = "v")]
    pub volume: Decimal,
    /// Whether this bar is final.
    #[serde(rename = "x")]
    pub closed: bool,
}

impl KlineData {
    pub fn to_candle(&self) -> Candle {
        Candle {
            time: self.open_time.div_euclid(1000),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: Some(self.volume),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn parses_rest_row() {
        let row = json!([
            1_700_000_040_000_i64,
            "36500.10",
            "36520.00",
            "36490.55",
            "36510.00",
            "12.345",
            1_700_000_099_999_i64,
            "450000.0",
            321,
            "6.1",
            "222000.0",
            "0"
        ]);
        let candle = Candle::from_rest_row(row.as_array().unwrap()).unwrap();

        assert_eq!(candle.time, 1_700_000_040);
        assert_eq!(candle.open, dec!(36500.10));
        assert_eq!(candle.high, dec!(36520.00));
        assert_eq!(candle.low, dec!(36490.55));
        assert_eq!(candle.close, dec!(36510.00));
        assert_eq!(candle.volume, Some(dec!(12.345)));
    }

    #[test]
    fn rejects_short_row() {
        let row = json!([1_700_000_040_000_i64, "1", "2"]);
        let err = Candle::from_rest_row(row.as_array().unwrap()).unwrap_err();
        assert!(matches!(err, FeedError::MalformedMessage(_)));
    }

    #[test]
    fn rejects_non_numeric_price() {
        let row = json!([1_700_000_040_000_i64, "abc", "2", "1", "1.5", "3"]);
        let err = Candle::from_rest_row(row.as_array().unwrap()).unwrap_err();
        assert!(err.to_string().contains("invalid open"));
    }

    #[test]
    fn rejects_string_open_time() {
        let row = json!(["1700000040000", "1", "2", "1", "1.5", "3"]);
        assert!(Candle::from_rest_row(row.as_array().unwrap()).is_err());
    }
}
