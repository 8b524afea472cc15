//! Crate-level error types.
//!
//! [`FeedError`] unifies every failure source of the feed (configuration,
//! REST, WebSocket, JSON) behind a single enum. The feed itself never hands
//! these to its host: they are logged at the feed boundary and turned into a
//! well-defined buffer/connection state. Sources and transports use them with
//! the `?` operator internally.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Top-level error type returned by fallible public APIs.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// An environment variable could not be interpreted.
    #[error("configuration error: {0}")]
    Config(String),

    /// A feed configuration violated its bounds (empty symbol, bar count out of range).
    #[error("invalid feed configuration: {0}")]
    InvalidConfig(String),

    /// The bulk kline request failed before a response was received,
    /// or its body could not be read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The bulk kline endpoint answered with a non-success status.
    #[error("http status {status}: {reason}")]
    HttpStatus { status: u16, reason: String },

    /// A WebSocket operation (connect, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A payload was valid JSON but not shaped like a kline.
    #[error("malformed message: {0}")]
    MalformedMessage(String),
}
