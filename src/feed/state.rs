//! The feed's synchronization and reconnection state machine.
//!
//! [`FeedCore`] is a pure transition function: every external happening is an
//! [`Input`], and every side effect it wants performed comes back as an
//! [`Effect`]. It never touches the network or the clock itself, which keeps
//! all ordering decisions in one place.
//!
//! Each fetch, transport and retry timer is tagged with an id drawn from one
//! increasing counter. The core remembers only the current id per slot and
//! drops any input carrying another one, so a late result from superseded
//! work can never mutate the buffer.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::buffer::{BufferChange, CandleBuffer, MergeOutcome};
use crate::Result;
use crate::models::{Candle, FeedConfig};
use crate::websocket::TransportEvent;

/// Stream connectivity as shown to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of the feed handed to the host.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    /// Candles ascending by time. Never mutated once published.
    pub candles: Arc<Vec<Candle>>,
    /// True only while the first fetch of a configuration is in flight.
    pub loading: bool,
    pub connection: ConnectionState,
    /// How the candles changed since the previous snapshot.
    pub change: BufferChange,
    pub config: Option<FeedConfig>,
    /// Increases by one with every published snapshot.
    pub revision: u64,
}

/// Why a bulk fetch was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// First load of a configuration; drives the `loading` flag.
    Initial,
    /// Gap repair before reopening the stream.
    Resync,
}

/// Something that happened to the feed.
#[derive(Debug)]
pub enum Input {
    Start(FeedConfig),
    Stop,
    Reconnect,
    FetchCompleted {
        id: u64,
        result: Result<Vec<Candle>>,
    },
    Transport {
        id: u64,
        event: TransportEvent,
    },
    RetryFired {
        id: u64,
    },
}

/// Work the runtime must perform on the feed's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Fetch { id: u64, config: FeedConfig },
    CancelFetch { id: u64 },
    OpenTransport { id: u64, config: FeedConfig },
    CloseTransport { id: u64 },
    ScheduleRetry { id: u64, delay: Duration },
    CancelRetry { id: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingFetch {
    id: u64,
    kind: FetchKind,
}

/// Owns the candle buffer and every piece of state that decides what
/// happens to it.
#[derive(Debug)]
pub struct FeedCore {
    retry_delay: Duration,
    config: Option<FeedConfig>,
    buffer: CandleBuffer,
    loading: bool,
    connection: ConnectionState,
    stopped: bool,

    // -- Generation slots --
    fetch: Option<PendingFetch>,
    transport: Option<u64>,
    retry: Option<u64>,
    next_id: u64,

    // -- Publication --
    pending_change: BufferChange,
    dirty: bool,
    revision: u64,
}

impl FeedCore {
    /// Creates an idle core. `retry_delay` is the fixed wait before a
    /// dropped stream is resynchronized.
    #[must_use]
    pub fn new(retry_delay: Duration) -> Self {
        Self {
            retry_delay,
            config: None,
            buffer: CandleBuffer::new(),
            loading: false,
            connection: ConnectionState::Disconnected,
            stopped: false,
            fetch: None,
            transport: None,
            retry: None,
            next_id: 1,
            pending_change: BufferChange::Unchanged,
            dirty: false,
            revision: 0,
        }
    }

    /// Applies one input and returns the effects it requires, in order.
    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        let mut effects = Vec::new();

        match input {
            Input::Start(config) => self.start(config, &mut effects),
            Input::Stop => self.stop(&mut effects),
            Input::Reconnect => self.reconnect(&mut effects),
            Input::FetchCompleted { id, result } => self.fetch_completed(id, result, &mut effects),
            Input::Transport { id, event } => self.transport_event(id, event, &mut effects),
            Input::RetryFired { id } => self.retry_fired(id, &mut effects),
        }

        effects
    }

    pub fn config(&self) -> Option<&FeedConfig> {
        self.config.as_ref()
    }

    pub fn candles(&self) -> Arc<Vec<Candle>> {
        self.buffer.snapshot()
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Id of the in-flight bulk fetch, if any.
    pub fn pending_fetch(&self) -> Option<u64> {
        self.fetch.map(|f| f.id)
    }

    /// Id of the transport currently considered live, if any.
    pub fn current_transport(&self) -> Option<u64> {
        self.transport
    }

    /// Id of the armed retry timer, if any.
    pub fn pending_retry(&self) -> Option<u64> {
        self.retry
    }

    /// Builds a snapshot of the current state without consuming the
    /// pending change.
    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            candles: self.buffer.snapshot(),
            loading: self.loading,
            connection: self.connection,
            change: self.pending_change,
            config: self.config.clone(),
            revision: self.revision,
        }
    }

    /// Returns a new snapshot if anything visible changed since the last
    /// call, resetting the accumulated change.
    pub fn take_dirty(&mut self) -> Option<FeedSnapshot> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        self.revision += 1;
        let snapshot = self.snapshot();
        self.pending_change = BufferChange::Unchanged;
        Some(snapshot)
    }

    // -- Operations --

    fn start(&mut self, config: FeedConfig, effects: &mut Vec<Effect>) {
        let in_flight = self.fetch.is_some() || self.transport.is_some() || self.retry.is_some();
        if !self.stopped && in_flight && self.config.as_ref() == Some(&config) {
            debug!(
                symbol = config.symbol(),
                interval = %config.interval(),
                "Feed already running for this configuration"
            );
            return;
        }

        self.release(effects);
        self.stopped = false;
        info!(
            symbol = config.symbol(),
            bars = config.bar_count(),
            interval = %config.interval(),
            "Starting feed"
        );

        if self.config.as_ref() != Some(&config) {
            self.dirty = true;
        }
        self.config = Some(config.clone());
        let change = self.buffer.clear();
        self.record_change(change);
        self.set_loading(true);
        self.set_connection(ConnectionState::Disconnected);
        self.issue_fetch(FetchKind::Initial, config, effects);
    }

    fn stop(&mut self, effects: &mut Vec<Effect>) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.release(effects);

        let change = self.buffer.clear();
        self.record_change(change);
        self.set_loading(false);
        self.set_connection(ConnectionState::Disconnected);
        info!("Feed stopped");
    }

    fn reconnect(&mut self, effects: &mut Vec<Effect>) {
        if self.stopped || self.config.is_none() {
            debug!("Ignoring reconnect on an idle feed");
            return;
        }
        if self.fetch.is_some() {
            debug!("Reconnect already in progress");
            return;
        }

        info!("Manual reconnect requested");
        self.resync(effects);
    }

    fn fetch_completed(
        &mut self,
        id: u64,
        result: Result<Vec<Candle>>,
        effects: &mut Vec<Effect>,
    ) {
        let Some(pending) = self.fetch.filter(|f| f.id == id) else {
            debug!(id, "Discarding result of superseded fetch");
            return;
        };
        self.fetch = None;

        let Some(config) = self.config.clone() else {
            return;
        };

        let change = match result {
            Ok(candles) => {
                info!(
                    symbol = config.symbol(),
                    interval = %config.interval(),
                    count = candles.len(),
                    kind = ?pending.kind,
                    "Fetched klines"
                );
                self.buffer.replace(candles)
            }
            Err(e) => {
                error!(
                    symbol = config.symbol(),
                    interval = %config.interval(),
                    kind = ?pending.kind,
                    "Failed to fetch klines: {e}"
                );
                self.buffer.clear()
            }
        };
        self.record_change(change);
        self.set_loading(false);
        self.open_transport(config, effects);
    }

    fn transport_event(&mut self, id: u64, event: TransportEvent, effects: &mut Vec<Effect>) {
        if self.transport != Some(id) {
            debug!(id, "Ignoring event from superseded transport");
            return;
        }

        match event {
            TransportEvent::Opened => {
                info!("Stream connected");
                self.set_connection(ConnectionState::Connected);
                self.cancel_retry(effects);
            }
            TransportEvent::Tick { candle, closed } => {
                let time = candle.time;
                let outcome = self.buffer.merge(candle);
                if outcome == MergeOutcome::Rejected {
                    debug!(time, closed, "Dropping out-of-order tick");
                }
                self.record_change(outcome.change());
            }
            TransportEvent::Closed => {
                warn!("Stream closed");
                self.transport_lost(id, effects);
            }
            TransportEvent::Error(reason) => {
                warn!(%reason, "Stream error");
                self.transport_lost(id, effects);
            }
        }
    }

    fn retry_fired(&mut self, id: u64, effects: &mut Vec<Effect>) {
        if self.retry != Some(id) {
            debug!(id, "Ignoring cancelled retry timer");
            return;
        }
        self.retry = None;
        info!("Retrying stream connection");
        self.resync(effects);
    }

    // -- Helpers --

    /// Drops the current transport, repairs the gap with a fresh fetch,
    /// and reopens the stream once the fetch settles.
    fn resync(&mut self, effects: &mut Vec<Effect>) {
        if self.fetch.is_some() {
            return;
        }
        let Some(config) = self.config.clone() else {
            return;
        };

        self.cancel_retry(effects);
        if let Some(id) = self.transport.take() {
            effects.push(Effect::CloseTransport { id });
        }
        self.set_connection(ConnectionState::Connecting);
        self.issue_fetch(FetchKind::Resync, config, effects);
    }

    fn transport_lost(&mut self, id: u64, effects: &mut Vec<Effect>) {
        self.transport = None;
        effects.push(Effect::CloseTransport { id });
        self.set_connection(ConnectionState::Disconnected);
        self.schedule_retry(effects);
    }

    fn schedule_retry(&mut self, effects: &mut Vec<Effect>) {
        if self.stopped || self.retry.is_some() {
            return;
        }
        let id = self.next_id();
        self.retry = Some(id);
        info!(
            delay_secs = self.retry_delay.as_secs_f64(),
            "Scheduling stream reconnect"
        );
        effects.push(Effect::ScheduleRetry {
            id,
            delay: self.retry_delay,
        });
    }

    fn cancel_retry(&mut self, effects: &mut Vec<Effect>) {
        if let Some(id) = self.retry.take() {
            effects.push(Effect::CancelRetry { id });
        }
    }

    fn issue_fetch(&mut self, kind: FetchKind, config: FeedConfig, effects: &mut Vec<Effect>) {
        let id = self.next_id();
        self.fetch = Some(PendingFetch { id, kind });
        effects.push(Effect::Fetch { id, config });
    }

    fn open_transport(&mut self, config: FeedConfig, effects: &mut Vec<Effect>) {
        let id = self.next_id();
        self.transport = Some(id);
        self.set_connection(ConnectionState::Connecting);
        effects.push(Effect::OpenTransport { id, config });
    }

    /// Cancels every outstanding fetch, transport and timer.
    fn release(&mut self, effects: &mut Vec<Effect>) {
        if let Some(fetch) = self.fetch.take() {
            effects.push(Effect::CancelFetch { id: fetch.id });
        }
        if let Some(id) = self.transport.take() {
            effects.push(Effect::CloseTransport { id });
        }
        self.cancel_retry(effects);
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record_change(&mut self, change: BufferChange) {
        if change != BufferChange::Unchanged {
            self.pending_change = self.pending_change.combine(change);
            self.dirty = true;
        }
    }

    fn set_loading(&mut self, loading: bool) {
        if self.loading != loading {
            self.loading = loading;
            self.dirty = true;
        }
    }

    fn set_connection(&mut self, connection: ConnectionState) {
        if self.connection != connection {
            self.connection = connection;
            self.dirty = true;
        }
    }
}
