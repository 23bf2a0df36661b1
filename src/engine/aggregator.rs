//! Error aggregation engine
//!
//! The first occurrence of an error is delivered immediately and opens a
//! window. Repeats of the same error inside the window are collected silently.
//! When the window's timer fires, a single summary is sent if anything was
//! collected. A periodic sweeper reclaims windows whose timer never fired.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use serde::Serialize;
use thiserror::Error;
use tokio::{sync::Mutex, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

use super::store::{AggregationStore, Observation};
use crate::{
    config::AggregatorConfig,
    models::{AggregationKey, AggregationRecord, ErrorReport},
    notification::{NotificationPayload, Notifier},
};

/// Errors that can occur when managing the aggregator's lifecycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregatorError {
    /// `start` was called while the sweeper was already running.
    #[error("Aggregator is already running")]
    AlreadyRunning,
}

/// How the aggregator handled a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// First occurrence of its key: a window was opened and an immediate
    /// notification attempted.
    Immediate {
        /// Whether the notifier accepted the notification.
        delivered: bool,
    },
    /// Repeat occurrence, collected into the open window.
    Suppressed {
        /// Occurrences in the window so far.
        count: usize,
    },
}

/// A snapshot of the aggregator's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregatorStats {
    /// Immediate notifications attempted.
    pub immediate_sent: u64,
    /// Aggregated summaries attempted.
    pub aggregated_sent: u64,
    /// Repeats collected without a notification.
    pub suppressed: u64,
    /// Notifications the notifier rejected.
    pub delivery_failures: u64,
    /// Windows reclaimed by the sweeper.
    pub swept: u64,
    /// Windows currently open.
    pub open_windows: usize,
}

#[derive(Debug, Default)]
struct Counters {
    immediate_sent: AtomicU64,
    aggregated_sent: AtomicU64,
    suppressed: AtomicU64,
    delivery_failures: AtomicU64,
    swept: AtomicU64,
}

/// State shared between the aggregator, its window timers and its sweeper.
struct Shared {
    config: AggregatorConfig,
    store: AggregationStore,
    notifier: Arc<dyn Notifier>,
    counters: Counters,
}

impl Shared {
    /// Closes window `window_id` of `key`, sending a summary if it collected
    /// repeats.
    async fn flush(&self, key: &AggregationKey, window_id: u64) {
        let Some(record) = self.store.close(key, window_id) else {
            tracing::debug!(key = %key, "Window already closed, nothing to flush.");
            return;
        };
        self.finalize(key, record).await;
    }

    async fn finalize(&self, key: &AggregationKey, record: AggregationRecord) {
        if record.count <= 1 {
            tracing::debug!(key = %key, "Window closed without repeats.");
            return;
        }

        tracing::info!(
            key = %key,
            error_type = %record.error_type,
            count = record.count,
            "Aggregation window closed. Dispatching summary."
        );
        self.counters.aggregated_sent.fetch_add(1, Ordering::Relaxed);
        self.deliver(key, NotificationPayload::Aggregated(record)).await;
    }

    /// Sends a payload, logging and counting failures. Returns whether the
    /// notifier accepted it.
    async fn deliver(&self, key: &AggregationKey, payload: NotificationPayload) -> bool {
        let aggregated = payload.is_aggregated();
        match self.notifier.send(payload).await {
            Ok(()) => true,
            Err(e) => {
                self.counters.delivery_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    key = %key,
                    aggregated,
                    "Failed to deliver notification: {}",
                    e
                );
                false
            }
        }
    }

    async fn sweep(&self) -> usize {
        let evicted = self.store.evict_stale(self.config.window_duration, Instant::now());
        let swept = evicted.len();
        for (key, record) in evicted {
            tracing::warn!(
                key = %key,
                count = record.count,
                "Evicting stale aggregation window whose timer did not fire."
            );
            self.counters.swept.fetch_add(1, Ordering::Relaxed);
            self.finalize(&key, record).await;
        }
        swept
    }
}

struct Sweeper {
    cancellation_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Deduplicates error reports into time-bounded windows.
///
/// Instances are independent; each owns its windows, their timers and its
/// sweeper. Must be used from within a tokio runtime.
pub struct ErrorAggregator {
    shared: Arc<Shared>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl ErrorAggregator {
    /// Creates a new aggregator delivering through `notifier`.
    pub fn new(config: AggregatorConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                store: AggregationStore::new(),
                notifier,
                counters: Counters::default(),
            }),
            sweeper: Mutex::new(None),
        }
    }

    /// The configuration this aggregator runs with.
    pub fn config(&self) -> &AggregatorConfig {
        &self.shared.config
    }

    /// Processes one error report.
    ///
    /// The first occurrence of a key opens a window, arms its timer and is
    /// delivered before this returns. Repeats are collected and return
    /// immediately. Delivery failures are logged, never returned.
    pub async fn process(&self, report: ErrorReport) -> ProcessOutcome {
        let key =
            AggregationKey::derive(&report.error_type, &report.message, report.client_id.as_deref());
        let now = chrono::Utc::now();

        let observation = self.shared.store.observe(key.clone(), report.clone(), now, |window_id| {
            self.arm_window_timer(key.clone(), window_id)
        });

        match observation {
            Observation::Opened { .. } => {
                tracing::info!(
                    key = %key,
                    error_type = %report.error_type,
                    "New error. Sending immediately and opening aggregation window."
                );
                self.shared.counters.immediate_sent.fetch_add(1, Ordering::Relaxed);
                let error_type = report.error_type.clone();
                let delivered = self
                    .shared
                    .deliver(&key, NotificationPayload::Single { error_type, report })
                    .await;
                ProcessOutcome::Immediate { delivered }
            }
            Observation::Accumulated { count } => {
                self.shared.counters.suppressed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, count, "Repeated error added to aggregation window.");
                ProcessOutcome::Suppressed { count }
            }
        }
    }

    fn arm_window_timer(&self, key: AggregationKey, window_id: u64) -> tokio::task::AbortHandle {
        let shared = Arc::clone(&self.shared);
        let deadline = Instant::now() + self.shared.config.window_duration;
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            shared.flush(&key, window_id).await;
        })
        .abort_handle()
    }

    /// Runs one sweeper cycle immediately. Returns how many windows were
    /// reclaimed.
    pub async fn sweep(&self) -> usize {
        self.shared.sweep().await
    }

    /// Starts the periodic sweeper.
    pub async fn start(&self) -> Result<(), AggregatorError> {
        let mut sweeper = self.sweeper.lock().await;
        if sweeper.is_some() {
            return Err(AggregatorError::AlreadyRunning);
        }

        let cancellation_token = CancellationToken::new();
        let token = cancellation_token.clone();
        let shared = Arc::clone(&self.shared);
        let period = shared.config.sweep_interval;
        let first_tick = Instant::now() + period;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(first_tick, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        tracing::debug!("Running stale window sweep...");
                        let swept = shared.sweep().await;
                        if swept > 0 {
                            tracing::info!(swept, "Sweeper reclaimed stale windows.");
                        }
                    }
                }
            }
            tracing::debug!("Sweeper stopped.");
        });

        tracing::info!(
            window_duration = ?self.shared.config.window_duration,
            sweep_interval = ?period,
            "Error aggregator started."
        );
        *sweeper = Some(Sweeper { cancellation_token, handle });
        Ok(())
    }

    /// Whether the sweeper is running.
    pub async fn is_running(&self) -> bool {
        self.sweeper.lock().await.is_some()
    }

    /// Stops the sweeper and abandons every open window.
    ///
    /// Outstanding timers are cancelled; collected repeats that were not yet
    /// summarized are dropped.
    pub async fn stop(&self) {
        let sweeper = self.sweeper.lock().await.take();
        if let Some(sweeper) = sweeper {
            sweeper.cancellation_token.cancel();
            if let Err(e) = sweeper.handle.await {
                tracing::error!("Sweeper task ended abnormally: {}", e);
            }
        }

        let dropped = self.shared.store.clear();
        if dropped > 0 {
            tracing::warn!(dropped, "Error aggregator stopped with open windows; they are lost.");
        } else {
            tracing::info!("Error aggregator stopped.");
        }
    }

    /// A copy of the record currently collected for `key`, if its window is
    /// open.
    pub fn open_window(&self, key: &AggregationKey) -> Option<AggregationRecord> {
        self.shared.store.get(key)
    }

    /// A snapshot of the aggregator's counters.
    pub fn stats(&self) -> AggregatorStats {
        let counters = &self.shared.counters;
        AggregatorStats {
            immediate_sent: counters.immediate_sent.load(Ordering::Relaxed),
            aggregated_sent: counters.aggregated_sent.load(Ordering::Relaxed),
            suppressed: counters.suppressed.load(Ordering::Relaxed),
            delivery_failures: counters.delivery_failures.load(Ordering::Relaxed),
            swept: counters.swept.load(Ordering::Relaxed),
            open_windows: self.shared.store.len(),
        }
    }

    #[cfg(test)]
    fn store(&self) -> &AggregationStore {
        &self.shared.store
    }
}

impl Drop for ErrorAggregator {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().take() {
            sweeper.cancellation_token.cancel();
        }
        self.shared.store.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        notification::{MockNotifier, error::NotificationError},
        test_helpers::{ErrorReportBuilder, RecordingNotifier},
    };

    const WINDOW: Duration = Duration::from_secs(300);

    fn create_aggregator(notifier: Arc<dyn Notifier>) -> ErrorAggregator {
        ErrorAggregator::new(AggregatorConfig::default(), notifier)
    }

    fn db_error(client: &str) -> ErrorReport {
        ErrorReportBuilder::new("DBError").message("conn refused").client(client).build()
    }

    /// Lets the paused clock run forward, firing any timers on the way.
    async fn elapse(duration: Duration) {
        tokio::time::sleep(duration).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_occurrence_is_sent_immediately() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|payload| !payload.is_aggregated() && payload.error_type() == "DBError")
            .times(1)
            .returning(|_| Ok(()));
        let aggregator = create_aggregator(Arc::new(notifier));

        let outcome = aggregator.process(db_error("L1")).await;

        assert_eq!(outcome, ProcessOutcome::Immediate { delivered: true });
        assert_eq!(aggregator.stats().open_windows, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_is_suppressed_without_send() {
        let mut notifier = MockNotifier::new();
        notifier.expect_send().times(1).returning(|_| Ok(()));
        let aggregator = create_aggregator(Arc::new(notifier));

        aggregator.process(db_error("L1")).await;
        let outcome = aggregator.process(db_error("L1")).await;

        assert_eq!(outcome, ProcessOutcome::Suppressed { count: 2 });
        let key = AggregationKey::derive("DBError", "conn refused", Some("L1"));
        assert_eq!(aggregator.open_window(&key).map(|r| r.count), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_immediate_send_still_opens_window() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .times(1)
            .returning(|_| Err(NotificationError::NotifyFailed("down".to_string())));
        let aggregator = create_aggregator(Arc::new(notifier));

        let first = aggregator.process(db_error("L1")).await;
        let second = aggregator.process(db_error("L1")).await;

        assert_eq!(first, ProcessOutcome::Immediate { delivered: false });
        assert_eq!(second, ProcessOutcome::Suppressed { count: 2 });
        assert_eq!(aggregator.stats().delivery_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lone_occurrence_closes_silently() {
        let notifier = Arc::new(RecordingNotifier::new());
        let aggregator = create_aggregator(notifier.clone());

        aggregator.process(db_error("L1")).await;
        elapse(WINDOW + Duration::from_millis(1)).await;

        assert_eq!(notifier.singles().len(), 1);
        assert!(notifier.aggregated().is_empty());
        assert_eq!(aggregator.stats().open_windows, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_summarized_once_at_window_close() {
        let notifier = Arc::new(RecordingNotifier::new());
        let aggregator = create_aggregator(notifier.clone());

        for _ in 0..5 {
            aggregator.process(db_error("L1")).await;
            elapse(Duration::from_secs(30)).await;
        }
        assert!(notifier.aggregated().is_empty());

        elapse(WINDOW).await;

        assert_eq!(notifier.singles().len(), 1);
        let aggregated = notifier.aggregated();
        assert_eq!(aggregated.len(), 1);
        let NotificationPayload::Aggregated(record) = &aggregated[0] else {
            panic!("expected an aggregated payload");
        };
        assert_eq!(record.count, 5);
        assert_eq!(record.occurrences.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeats_do_not_extend_window() {
        let notifier = Arc::new(RecordingNotifier::new());
        let aggregator = create_aggregator(notifier.clone());

        aggregator.process(db_error("L1")).await;
        elapse(Duration::from_secs(290)).await;
        aggregator.process(db_error("L1")).await;
        elapse(Duration::from_secs(11)).await;

        assert_eq!(notifier.aggregated().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_summary_still_closes_window() {
        let notifier = Arc::new(RecordingNotifier::new());
        let aggregator = create_aggregator(notifier.clone());

        aggregator.process(db_error("L1")).await;
        aggregator.process(db_error("L1")).await;
        notifier.set_failing(true);
        elapse(WINDOW + Duration::from_millis(1)).await;

        assert_eq!(notifier.aggregated().len(), 1);
        assert_eq!(aggregator.stats().open_windows, 0);

        notifier.set_failing(false);
        let outcome = aggregator.process(db_error("L1")).await;
        assert_eq!(outcome, ProcessOutcome::Immediate { delivered: true });
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_summarizes_window_with_stalled_timer() {
        let notifier = Arc::new(RecordingNotifier::new());
        let aggregator = create_aggregator(notifier.clone());
        aggregator.start().await.unwrap();

        aggregator.process(db_error("L1")).await;
        aggregator.process(db_error("L1")).await;
        let key = AggregationKey::derive("DBError", "conn refused", Some("L1"));
        aggregator.store().stall_timer(&key);

        elapse(WINDOW + Duration::from_secs(1)).await;
        assert!(notifier.aggregated().is_empty());
        assert_eq!(aggregator.stats().open_windows, 1);

        elapse(aggregator.config().sweep_interval).await;

        assert_eq!(aggregator.stats().open_windows, 0);
        assert_eq!(aggregator.stats().swept, 1);
        let aggregated = notifier.aggregated();
        assert_eq!(aggregated.len(), 1);
        assert!(matches!(&aggregated[0], NotificationPayload::Aggregated(r) if r.count == 2));

        aggregator.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_drops_lone_stalled_window_silently() {
        let notifier = Arc::new(RecordingNotifier::new());
        let aggregator = create_aggregator(notifier.clone());

        aggregator.process(db_error("L1")).await;
        let key = AggregationKey::derive("DBError", "conn refused", Some("L1"));
        aggregator.store().stall_timer(&key);
        elapse(WINDOW + Duration::from_secs(1)).await;

        assert_eq!(aggregator.sweep().await, 1);
        assert!(notifier.aggregated().is_empty());
        assert_eq!(aggregator.stats().open_windows, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_leaves_fresh_windows_alone() {
        let notifier = Arc::new(RecordingNotifier::new());
        let aggregator = create_aggregator(notifier.clone());

        aggregator.process(db_error("L1")).await;
        elapse(Duration::from_secs(60)).await;

        assert_eq!(aggregator.sweep().await, 0);
        assert_eq!(aggregator.stats().open_windows, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_rejected() {
        let aggregator = create_aggregator(Arc::new(RecordingNotifier::new()));

        aggregator.start().await.unwrap();
        assert_eq!(aggregator.start().await, Err(AggregatorError::AlreadyRunning));
        assert!(aggregator.is_running().await);

        aggregator.stop().await;
        assert!(!aggregator.is_running().await);
        assert!(aggregator.start().await.is_ok());
        aggregator.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_abandons_open_windows() {
        let notifier = Arc::new(RecordingNotifier::new());
        let aggregator = create_aggregator(notifier.clone());
        aggregator.start().await.unwrap();

        aggregator.process(db_error("L1")).await;
        aggregator.process(db_error("L1")).await;
        aggregator.stop().await;
        elapse(WINDOW * 2).await;

        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(aggregator.stats().open_windows, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_occurrences_send_once() {
        let notifier = Arc::new(RecordingNotifier::new());
        let aggregator = Arc::new(create_aggregator(notifier.clone()));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let aggregator = Arc::clone(&aggregator);
                tokio::spawn(async move { aggregator.process(db_error("L1")).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(notifier.singles().len(), 1);
        assert_eq!(aggregator.stats().suppressed, 31);
    }
}
