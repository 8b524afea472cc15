//! Shared test utilities: scripted data sources the test drives by hand.

#![allow(dead_code)]

use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot, watch};

use klinefeed::models::{Candle, FeedConfig, Interval};
use klinefeed::rest::KlineSource;
use klinefeed::websocket::{StreamConnector, TransportSink};
use klinefeed::{FeedError, FeedSnapshot, Result};

/// Binance futures REST endpoint used by the live tests.
pub const BINANCE_REST_URL: &str = "https://fapi.binance.com";

/// Binance futures stream endpoint used by the live tests.
pub const BINANCE_WS_URL: &str = "wss://fstream.binance.com/ws";

/// Upper bound for any single wait in the feed tests.
pub const WAIT: Duration = Duration::from_secs(2);

pub fn bar(time: i64, close: i64) -> Candle {
    let close = Decimal::from(close);
    Candle {
        time,
        open: close,
        high: close,
        low: close,
        close,
        volume: None,
    }
}

pub fn config(symbol: &str) -> FeedConfig {
    FeedConfig::new(symbol, 100, Interval::M1).unwrap()
}

/// A bulk fetch the test must answer.
pub struct FetchCall {
    pub config: FeedConfig,
    reply: oneshot::Sender<Result<Vec<Candle>>>,
}

impl FetchCall {
    pub fn ok(self, candles: Vec<Candle>) {
        let _ = self.reply.send(Ok(candles));
    }

    pub fn fail(self, status: u16) {
        let _ = self.reply.send(Err(FeedError::HttpStatus {
            status,
            reason: "scripted failure".to_string(),
        }));
    }
}

/// [`KlineSource`] that forwards every request to the test.
pub struct ScriptedSource {
    calls: mpsc::UnboundedSender<FetchCall>,
}

impl ScriptedSource {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FetchCall>) {
        let (calls, rx) = mpsc::unbounded_channel();
        (Self { calls }, rx)
    }
}

impl KlineSource for ScriptedSource {
    async fn fetch_klines(&self, config: &FeedConfig) -> Result<Vec<Candle>> {
        let (reply, answer) = oneshot::channel();
        let _ = self.calls.send(FetchCall {
            config: config.clone(),
            reply,
        });
        answer
            .await
            .unwrap_or_else(|_| Err(FeedError::MalformedMessage("reply dropped".to_string())))
    }
}

/// A stream transport the test drives through its sink.
pub struct StreamCall {
    pub config: FeedConfig,
    pub sink: TransportSink,
}

/// [`StreamConnector`] that hands each transport's sink to the test and then
/// stays open until the feed aborts it.
pub struct ScriptedStream {
    calls: mpsc::UnboundedSender<StreamCall>,
}

impl ScriptedStream {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamCall>) {
        let (calls, rx) = mpsc::unbounded_channel();
        (Self { calls }, rx)
    }
}

impl StreamConnector for ScriptedStream {
    async fn run(&self, config: &FeedConfig, sink: TransportSink) {
        let _ = self.calls.send(StreamCall {
            config: config.clone(),
            sink,
        });
        std::future::pending::<()>().await;
    }
}

/// Receives the next scripted call or panics after [`WAIT`].
pub async fn next_call<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for call")
        .expect("call channel closed")
}

/// Asserts that no further call arrives within a short grace period.
pub async fn assert_no_call<T>(rx: &mut mpsc::UnboundedReceiver<T>) {
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(rx.try_recv().is_err(), "unexpected extra call");
}

/// Waits until a snapshot satisfies `predicate` and returns it.
pub async fn wait_for<F>(rx: &mut watch::Receiver<FeedSnapshot>, predicate: F) -> FeedSnapshot
where
    F: FnMut(&FeedSnapshot) -> bool,
{
    tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("timed out waiting for snapshot")
        .expect("feed dropped")
        .clone()
}
