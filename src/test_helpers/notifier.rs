use std::sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;

use crate::notification::{NotificationPayload, Notifier, error::NotificationError};

/// A notifier that keeps every payload it is given, for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationPayload>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    /// Creates a notifier that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a notifier that records and then rejects everything.
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.set_failing(true);
        notifier
    }

    /// Makes subsequent sends fail (or succeed again).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// All payloads received so far, in order.
    pub fn sent(&self) -> Vec<NotificationPayload> {
        self.sent.lock().unwrap().clone()
    }

    /// Payloads for first occurrences.
    pub fn singles(&self) -> Vec<NotificationPayload> {
        self.sent().into_iter().filter(|p| !p.is_aggregated()).collect()
    }

    /// Payloads summarizing a window.
    pub fn aggregated(&self) -> Vec<NotificationPayload> {
        self.sent().into_iter().filter(|p| p.is_aggregated()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, payload: NotificationPayload) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(payload);
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationError::NotifyFailed("recording notifier set to fail".into()));
        }
        Ok(())
    }
}
