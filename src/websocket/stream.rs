//! Binance kline stream transport.

use futures_util::StreamExt;
use tracing::{debug, info, warn};
use tungstenite::Message;

use super::{StreamConnector, TransportEvent, TransportSink, connect};
use crate::Result;
use crate::error::FeedError;
use crate::models::candle::KlineEvent;
use crate::models::{Candle, FeedConfig};

/// Default futures stream endpoint.
pub const DEFAULT_WS_URL: &str = "wss://fstream.binance.com/ws";

/// Connects to `<base>/<symbol>@kline_<interval>` and forwards every kline
/// update to the feed.
#[derive(Debug, Clone)]
pub struct BinanceStream {
    base_url: String,
}

impl BinanceStream {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for BinanceStream {
    fn default() -> Self {
        Self::new(DEFAULT_WS_URL)
    }
}

impl StreamConnector for BinanceStream {
    async fn run(&self, config: &FeedConfig, sink: TransportSink) {
        let url = stream_url(&self.base_url, config);
        info!(url = %url, transport = sink.id(), "Connecting to kline stream");

        match read_loop(&url, &sink).await {
            Ok(()) => {
                sink.emit(TransportEvent::Closed);
            }
            Err(e) => {
                sink.emit(TransportEvent::Error(e.to_string()));
            }
        }
    }
}

/// Builds the single-stream URL for a feed configuration.
pub fn stream_url(base_url: &str, config: &FeedConfig) -> String {
    format!(
        "{}/{}@kline_{}",
        base_url.trim_end_matches('/'),
        config.symbol().to_lowercase(),
        config.interval().as_str()
    )
}

/// Reads frames until the stream ends or the feed stops listening.
async fn read_loop(url: &str, sink: &TransportSink) -> Result<()> {
    // The write half stays alive so control-frame replies can be flushed.
    let (_write, mut read) = connect(url).await?;

    if !sink.emit(TransportEvent::Opened) {
        return Ok(());
    }

    while let Some(msg) = read.next().await {
        match msg? {
            Message::Text(text) => match parse_frame(&text) {
                Ok(Some((candle, closed))) => {
                    if !sink.emit(TransportEvent::Tick { candle, closed }) {
                        debug!("Feed dropped, leaving read loop");
                        return Ok(());
                    }
                }
                Ok(None) => debug!("Skipping non-kline frame"),
                Err(e) => warn!("Failed to parse kline frame: {e}"),
            },
            Message::Close(frame) => {
                info!(?frame, "Server closed kline stream");
                break;
            }
            _ => {} // Binary/Ping/Pong frames
        }
    }

    Ok(())
}

/// Parses one text frame into a candle and its `closed` flag.
///
/// Returns `Ok(None)` for valid JSON that carries no kline (subscription
/// acks, other event types). Frames from combined streams
/// (`{"stream": .., "data": {..}}`) are unwrapped.
///
/// # Errors
///
/// Returns a [`FeedError`] if the frame is not JSON or its kline payload is
/// malformed.
pub fn parse_frame(text: &str) -> Result<Option<(Candle, bool)>> {
    let mut value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| FeedError::MalformedMessage(e.to_string()))?;

    if let Some(data) = value.get_mut("data").map(serde_json::Value::take) {
        value = data;
    }

    if value.get("k").is_none() {
        return Ok(None);
    }

    let event: KlineEvent = serde_json::from_value(value)?;
    Ok(Some((event.kline.to_candle(), event.kline.closed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Interval;
    use rust_decimal_macros::dec;

    const KLINE_FRAME: &str = r#"{
        "e": "kline",
        "E": 1700000065123,
        "s": "BTCUSDT",
        "k": {
            "t": 1700000040000,
            "T": 1700000099999,
            "s": "BTCUSDT",
            "i": "1m",
            "f": 100,
            "L": 200,
            "o": "36500.10",
            "c": "36510.00",
            "h": "36520.00",
            "l": "36490.55",
            "v": "12.345",
            "n": 100,
            "x": false,
            "q": "450000.0",
            "V": "6.1",
            "Q": "222000.0",
            "B": "0"
        }
    }"#;

    #[test]
    fn builds_stream_url() {
        let config = FeedConfig::new("BTCUSDT", 10, Interval::H4).unwrap();
        assert_eq!(
            stream_url("wss://fstream.binance.com/ws/", &config),
            "wss://fstream.binance.com/ws/btcusdt@kline_4h"
        );
    }

    #[test]
    fn parses_kline_frame() {
        let (candle, closed) = parse_frame(KLINE_FRAME).unwrap().unwrap();

        assert_eq!(candle.time, 1_700_000_040);
        assert_eq!(candle.open, dec!(36500.10));
        assert_eq!(candle.high, dec!(36520.00));
        assert_eq!(candle.low, dec!(36490.55));
        assert_eq!(candle.close, dec!(36510.00));
        assert_eq!(candle.volume, Some(dec!(12.345)));
        assert!(!closed);
    }

    #[test]
    fn unwraps_combined_stream_frame() {
        let wrapped = format!(r#"{{"stream":"btcusdt@kline_1m","data":{KLINE_FRAME}}}"#);
        let (candle, _) = parse_frame(&wrapped).unwrap().unwrap();
        assert_eq!(candle.time, 1_700_000_040);
    }

    #[test]
    fn skips_frames_without_kline() {
        assert!(parse_frame(r#"{"result":null,"id":1}"#).unwrap().is_none());
    }

    #[test]
    fn rejects_invalid_json() {
        let err = parse_frame("not json").unwrap_err();
        assert!(matches!(err, FeedError::MalformedMessage(_)));
    }

    #[test]
    fn rejects_malformed_kline() {
        let frame = r#"{"e":"kline","E":1,"s":"BTCUSDT","k":{"t":1,"o":"x"}}"#;
        assert!(parse_frame(frame).is_err());
    }
}
