//! In-memory store of open aggregation windows.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use tokio::{task::AbortHandle, time::Instant};

use crate::models::{AggregationKey, AggregationRecord, ErrorReport};

/// An open window: the record being collected plus the timer that will close
/// it.
#[derive(Debug)]
struct OpenWindow {
    /// Identifies this window among all windows ever opened for the key.
    id: u64,
    record: AggregationRecord,
    /// Monotonic time of the latest occurrence, used by the sweeper.
    last_activity: Instant,
    timer: AbortHandle,
}

impl OpenWindow {
    fn cancel_timer(&self) {
        // Aborting a finished or already aborted task is a no-op.
        self.timer.abort();
    }
}

/// What happened to an occurrence handed to [`AggregationStore::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The key had no open window; a new one was opened and its timer armed.
    Opened {
        /// Identifier of the new window.
        window_id: u64,
    },
    /// The occurrence was appended to the key's open window.
    Accumulated {
        /// Occurrences in the window so far.
        count: usize,
    },
}

/// Maps aggregation keys to their open windows.
///
/// Every decision about whether a window exists is made under the key's shard
/// lock, so concurrent first occurrences of one key open exactly one window.
#[derive(Debug, Default)]
pub struct AggregationStore {
    windows: DashMap<AggregationKey, OpenWindow>,
    next_window_id: AtomicU64,
}

impl AggregationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an occurrence of `key` processed at `now`.
    ///
    /// When no window is open, one is created and `arm` is called with the new
    /// window's id to schedule its close; the returned handle becomes the
    /// window's timer. `arm` runs while the key is locked and must not block.
    pub fn observe<F>(
        &self,
        key: AggregationKey,
        report: ErrorReport,
        now: DateTime<Utc>,
        arm: F,
    ) -> Observation
    where
        F: FnOnce(u64) -> AbortHandle,
    {
        match self.windows.entry(key) {
            Entry::Occupied(mut entry) => {
                let window = entry.get_mut();
                window.record.record(report, now);
                window.last_activity = Instant::now();
                Observation::Accumulated { count: window.record.count }
            }
            Entry::Vacant(entry) => {
                let id = self.next_window_id.fetch_add(1, Ordering::Relaxed);
                let timer = arm(id);
                entry.insert(OpenWindow {
                    id,
                    record: AggregationRecord::open(report, now),
                    last_activity: Instant::now(),
                    timer,
                });
                Observation::Opened { window_id: id }
            }
        }
    }

    /// Removes the window `window_id` of `key` and returns its record.
    ///
    /// Returns `None` when that window was already closed, so a late timer can
    /// never close a newer window for the same key.
    pub fn close(&self, key: &AggregationKey, window_id: u64) -> Option<AggregationRecord> {
        self.windows
            .remove_if(key, |_, window| window.id == window_id)
            .map(|(_, window)| window.record)
    }

    /// Removes every window whose latest occurrence is older than `max_idle`
    /// at `now`, cancelling their timers.
    pub fn evict_stale(
        &self,
        max_idle: Duration,
        now: Instant,
    ) -> Vec<(AggregationKey, AggregationRecord)> {
        let stale: Vec<AggregationKey> = self
            .windows
            .iter()
            .filter(|entry| is_stale(entry.value(), max_idle, now))
            .map(|entry| entry.key().clone())
            .collect();

        stale
            .into_iter()
            .filter_map(|key| {
                // Re-checked under the lock; the window may have moved on.
                self.windows.remove_if(&key, |_, window| is_stale(window, max_idle, now))
            })
            .map(|(key, window)| {
                window.cancel_timer();
                (key, window.record)
            })
            .collect()
    }

    /// Drops every open window and cancels its timer. Returns how many were
    /// dropped.
    pub fn clear(&self) -> usize {
        let keys: Vec<AggregationKey> = self.windows.iter().map(|e| e.key().clone()).collect();
        keys.into_iter()
            .filter_map(|key| self.windows.remove(&key))
            .inspect(|(_, window)| window.cancel_timer())
            .count()
    }

    /// A copy of the record currently collected for `key`.
    pub fn get(&self, key: &AggregationKey) -> Option<AggregationRecord> {
        self.windows.get(key).map(|window| window.record.clone())
    }

    /// Number of open windows.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Whether no window is open.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Cancels the timer of `key` without closing the window, as if the timer
    /// had been lost.
    #[cfg(test)]
    pub(crate) fn stall_timer(&self, key: &AggregationKey) {
        if let Some(window) = self.windows.get(key) {
            window.cancel_timer();
        }
    }
}

fn is_stale(window: &OpenWindow, max_idle: Duration, now: Instant) -> bool {
    now.saturating_duration_since(window.last_activity) > max_idle
}
