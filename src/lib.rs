//! Candle feed client library.
//!
//! Keeps an ordered OHLC candle buffer for one symbol/interval live by
//! combining a bulk REST kline fetch with a streamed kline WebSocket, and
//! recovers dropped streams with a fixed-delay resync.

pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod progress;
pub mod rest;
pub mod websocket;

pub use error::{FeedError, Result};
pub use feed::{BufferChange, CandleFeed, ConnectionState, FeedOptions, FeedSnapshot};
pub use models::{Candle, FeedConfig, Interval};
