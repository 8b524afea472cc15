use klinefeed::config::fetch_config;
use klinefeed::rest::BinanceRest;
use klinefeed::websocket::BinanceStream;
use klinefeed::{CandleFeed, FeedError};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), FeedError> {
    // Initialize tracing subscriber for logging output.
    tracing_subscriber::fmt::init();

    let _ = rustls::crypto::ring::default_provider().install_default();

    let app_config = fetch_config()?;

    let feed = CandleFeed::spawn(
        BinanceRest::new(&app_config.endpoints.rest_url),
        BinanceStream::new(&app_config.endpoints.websocket_url),
        app_config.options,
    );
    let mut snapshots = feed.start(app_config.feed.clone());

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let last = snapshot.candles.last();
                info!(
                    revision = snapshot.revision,
                    candles = snapshot.candles.len(),
                    change = ?snapshot.change,
                    loading = snapshot.loading,
                    connection = %snapshot.connection,
                    last_time = last.map(|c| c.time),
                    last_close = last.map(|c| c.close.to_string()),
                    "Feed update"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    feed.shutdown().await;

    Ok(())
}
