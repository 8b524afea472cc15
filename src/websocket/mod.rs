//! Streaming transport for live kline updates.
//!
//! This module is organized as:
//! - the [`StreamConnector`] seam the feed drives, plus the event vocabulary
//!   a transport reports through its [`TransportSink`]
//! - [`stream`] - the Binance `<symbol>@kline_<interval>` implementation

pub mod stream;

use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use std::future::Future;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::info;
use tungstenite::Message;

use crate::Result;
use crate::feed::state::Input;
use crate::models::{Candle, FeedConfig};

pub use stream::{BinanceStream, DEFAULT_WS_URL, parse_frame, stream_url};

/// Write half of a kline stream connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of a kline stream connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Establishes a WebSocket connection to the given URL.
///
/// # Errors
///
/// Returns a [`FeedError`](crate::FeedError) if the connection or TLS handshake fails.
pub async fn connect(url: &str) -> Result<(WsWriter, WsReader)> {
    let (ws_stream, _) = connect_async(url).await?;
    info!(url, "WebSocket handshake completed");

    Ok(ws_stream.split())
}

/// Lifecycle signal reported by a stream transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection is established and ticks may follow.
    Opened,
    /// One bar update. `closed` marks a final bar; the feed merges both kinds alike.
    Tick { candle: Candle, closed: bool },
    /// The peer or the stream ended the connection.
    Closed,
    /// The connection failed.
    Error(String),
}

/// Where a transport reports its events. Bound to one transport id, so the
/// feed can tell a current transport from a superseded one.
#[derive(Debug, Clone)]
pub struct TransportSink {
    id: u64,
    tx: mpsc::UnboundedSender<Input>,
}

impl TransportSink {
    pub(crate) fn new(id: u64, tx: mpsc::UnboundedSender<Input>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Reports an event. Returns `false` once the feed has gone away, at
    /// which point the transport should wind down.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send(Input::Transport { id: self.id, event }).is_ok()
    }
}

/// Opens and drives one streaming connection for a feed configuration.
///
/// `run` must report [`TransportEvent::Opened`] once connected and finish
/// with exactly one of [`TransportEvent::Closed`] or [`TransportEvent::Error`].
/// The feed may abort the returned future at any await point.
pub trait StreamConnector: Send + Sync + 'static {
    fn run(&self, config: &FeedConfig, sink: TransportSink) -> impl Future<Output = ()> + Send;
}
