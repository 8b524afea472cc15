//! The candle feed: a live, ordered candle buffer for one configuration.
//!
//! This module is organized as:
//! - [`buffer`] - ordered storage and tick merge rules
//! - [`state`] - the synchronization/reconnection state machine
//! - [`CandleFeed`] - the async runtime that executes the state machine's effects
//!
//! One driver task owns all feed state and handles every input from a single
//! queue. Fetches, transports and the retry timer run as child tasks that
//! report back through that queue, tagged with the id they were started
//! under.

pub mod buffer;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

pub use buffer::{BufferChange, CandleBuffer, MergeOutcome};
pub use state::{ConnectionState, Effect, FeedCore, FeedSnapshot, FetchKind, Input};

use crate::models::{Candle, FeedConfig};
use crate::rest::KlineSource;
use crate::websocket::{StreamConnector, TransportSink};

/// Fixed wait between a dropped stream and the next resync attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Tunables for a [`CandleFeed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOptions {
    pub retry_delay: Duration,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Handle to a running candle feed.
///
/// Commands are fire-and-forget and never fail; state is observed through
/// snapshots. Dropping the handle stops the feed and releases its transport
/// and timers.
pub struct CandleFeed {
    tx: mpsc::UnboundedSender<Input>,
    snapshots: watch::Receiver<FeedSnapshot>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CandleFeed {
    /// Spawns the feed driver on the current tokio runtime. The feed stays
    /// idle until [`start`](Self::start) is called.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn<S, C>(source: S, connector: C, options: FeedOptions) -> Self
    where
        S: KlineSource,
        C: StreamConnector,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshots) = watch::channel(FeedSnapshot::default());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let driver = Driver {
            core: FeedCore::new(options.retry_delay),
            source: Arc::new(source),
            connector: Arc::new(connector),
            tx: tx.clone(),
            snapshot_tx,
            fetch: None,
            transport: None,
            retry: None,
        };
        let task = tokio::spawn(driver.run(rx, shutdown_rx));

        Self {
            tx,
            snapshots,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Loads `config` and keeps it live. Starting the configuration that is
    /// already running is a no-op; any other configuration replaces the
    /// current one entirely.
    ///
    /// Returns a receiver that observes every published snapshot.
    pub fn start(&self, config: FeedConfig) -> watch::Receiver<FeedSnapshot> {
        self.send(Input::Start(config));
        self.subscribe()
    }

    /// Releases the stream, cancels any fetch and retry timer, and discards
    /// the buffer. Safe to call repeatedly.
    pub fn stop(&self) {
        self.send(Input::Stop);
    }

    /// Drops the current stream, refetches the window to repair any gap,
    /// then reopens the stream.
    ///
    /// Collapses with an attempt whose fetch is still in flight. Once that
    /// fetch has landed and the stream is reopening, a new call restarts the
    /// attempt from the fetch; the superseded stream is closed first, so only
    /// one transport is ever live.
    pub fn reconnect(&self) {
        self.send(Input::Reconnect);
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn candles(&self) -> Arc<Vec<Candle>> {
        Arc::clone(&self.snapshots.borrow().candles)
    }

    pub fn loading(&self) -> bool {
        self.snapshots.borrow().loading
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.snapshots.borrow().connection
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshots.clone()
    }

    /// Stops the feed and waits for the driver task to exit.
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn send(&self, input: Input) {
        if self.tx.send(input).is_err() {
            debug!("Feed driver has exited, ignoring command");
        }
    }
}

impl Drop for CandleFeed {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// A spawned child task and the id the core knows it by.
struct Slot {
    id: u64,
    handle: JoinHandle<()>,
}

impl Slot {
    /// Aborts the task held in `slot` if it carries `id`.
    fn cancel(slot: &mut Option<Slot>, id: u64) {
        if slot.as_ref().is_some_and(|s| s.id == id) {
            Self::clear(slot);
        }
    }

    fn clear(slot: &mut Option<Slot>) {
        if let Some(previous) = slot.take() {
            previous.handle.abort();
        }
    }
}

/// Owns the [`FeedCore`] and turns its effects into tasks.
struct Driver<S, C> {
    core: FeedCore,
    source: Arc<S>,
    connector: Arc<C>,
    tx: mpsc::UnboundedSender<Input>,
    snapshot_tx: watch::Sender<FeedSnapshot>,
    fetch: Option<Slot>,
    transport: Option<Slot>,
    retry: Option<Slot>,
}

impl<S, C> Driver<S, C>
where
    S: KlineSource,
    C: StreamConnector,
{
    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<Input>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    self.apply(Input::Stop);
                    break;
                }

                input = rx.recv() => match input {
                    Some(input) => self.apply(input),
                    None => break,
                },
            }
        }

        debug!("Feed driver exited");
    }

    fn apply(&mut self, input: Input) {
        for effect in self.core.handle(input) {
            self.execute(effect);
        }
        if let Some(snapshot) = self.core.take_dirty() {
            self.snapshot_tx.send_replace(snapshot);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Fetch { id, config } => {
                Slot::clear(&mut self.fetch);
                let source = Arc::clone(&self.source);
                let tx = self.tx.clone();
                let handle = tokio::spawn(async move {
                    let result = source.fetch_klines(&config).await;
                    let _ = tx.send(Input::FetchCompleted { id, result });
                });
                self.fetch = Some(Slot { id, handle });
            }
            Effect::CancelFetch { id } => Slot::cancel(&mut self.fetch, id),
            Effect::OpenTransport { id, config } => {
                Slot::clear(&mut self.transport);
                let connector = Arc::clone(&self.connector);
                let sink = TransportSink::new(id, self.tx.clone());
                let handle = tokio::spawn(async move {
                    connector.run(&config, sink).await;
                });
                self.transport = Some(Slot { id, handle });
            }
            Effect::CloseTransport { id } => Slot::cancel(&mut self.transport, id),
            Effect::ScheduleRetry { id, delay } => {
                Slot::clear(&mut self.retry);
                let tx = self.tx.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(Input::RetryFired { id });
                });
                self.retry = Some(Slot { id, handle });
            }
            Effect::CancelRetry { id } => Slot::cancel(&mut self.retry, id),
        }
    }
}

impl<S, C> Drop for Driver<S, C> {
    fn drop(&mut self) {
        Slot::clear(&mut self.fetch);
        Slot::clear(&mut self.transport);
        Slot::clear(&mut self.retry);
    }
}
