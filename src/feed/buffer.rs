//! The ordered candle buffer and its merge rules.

use std::sync::Arc;

use crate::models::Candle;

/// How the buffer last changed, as seen by a consumer of snapshots.
///
/// Rendering layers use this to decide between resetting their view
/// (`NewDataset`) and extending it in place.
///
/// Variants are ordered by how much of a consumer's view they invalidate,
/// so several changes fold into one with [`BufferChange::combine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum BufferChange {
    /// Nothing about the candles changed.
    #[default]
    Unchanged,
    /// The final bar was replaced in place.
    LastUpdated,
    /// A new final bar was appended.
    Appended,
    /// Wholesale replacement that extends the previous dataset.
    Continuation,
    /// Wholesale replacement that does not extend the previous dataset.
    NewDataset,
}

impl BufferChange {
    /// Folds two consecutive changes into the one a consumer must act on.
    pub fn combine(self, next: BufferChange) -> BufferChange {
        self.max(next)
    }
}

/// Result of merging one streamed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    LastUpdated,
    Appended,
    /// The tick was older than the final bar and was dropped.
    Rejected,
}

impl MergeOutcome {
    pub fn change(self) -> BufferChange {
        match self {
            MergeOutcome::LastUpdated => BufferChange::LastUpdated,
            MergeOutcome::Appended => BufferChange::Appended,
            MergeOutcome::Rejected => BufferChange::Unchanged,
        }
    }
}

/// Candles ordered strictly ascending by `time`.
///
/// Storage is copy-on-write: a snapshot handed out via [`CandleBuffer::snapshot`]
/// is never mutated afterwards; the next write clones it first.
#[derive(Debug, Clone, Default)]
pub struct CandleBuffer {
    candles: Arc<Vec<Candle>>,
}

impl CandleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Vec<Candle>> {
        Arc::clone(&self.candles)
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn first_time(&self) -> Option<i64> {
        self.candles.first().map(|c| c.time)
    }

    /// Merges one streamed tick into the tail of the buffer.
    ///
    /// Never inserts into the middle and never reorders.
    pub fn merge(&mut self, tick: Candle) -> MergeOutcome {
        let last_time = self.candles.last().map(|c| c.time);

        match last_time {
            None => {
                Arc::make_mut(&mut self.candles).push(tick);
                MergeOutcome::Appended
            }
            Some(last) if tick.time == last => {
                let candles = Arc::make_mut(&mut self.candles);
                if let Some(slot) = candles.last_mut() {
                    *slot = tick;
                }
                MergeOutcome::LastUpdated
            }
            Some(last) if tick.time > last => {
                Arc::make_mut(&mut self.candles).push(tick);
                MergeOutcome::Appended
            }
            Some(_) => MergeOutcome::Rejected,
        }
    }

    /// Replaces the whole buffer and classifies the replacement.
    ///
    /// Entries whose time does not strictly exceed the previously kept
    /// entry are dropped, so the ordering invariant survives a bad window.
    pub fn replace(&mut self, candles: Vec<Candle>) -> BufferChange {
        let mut ordered: Vec<Candle> = Vec::with_capacity(candles.len());
        for candle in candles {
            if ordered.last().is_none_or(|last| candle.time > last.time) {
                ordered.push(candle);
            }
        }

        let previous_first = self.first_time();
        let previous_len = self.len();
        let next_first = ordered.first().map(|c| c.time);
        let change = if next_first != previous_first || ordered.len() < previous_len {
            BufferChange::NewDataset
        } else {
            BufferChange::Continuation
        };

        self.candles = Arc::new(ordered);
        change
    }

    /// Empties the buffer. Clearing a non-empty buffer starts a new dataset.
    pub fn clear(&mut self) -> BufferChange {
        if self.candles.is_empty() {
            return BufferChange::Unchanged;
        }
        self.candles = Arc::new(Vec::new());
        BufferChange::NewDataset
    }
}
