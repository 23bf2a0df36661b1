use std::io::Write;

use async_trait::async_trait;

use super::{Notifier, NotificationPayload, error::NotificationError, formatter::format_payload};

/// A notifier that prints formatted messages to standard output.
#[derive(Debug, Default, Clone)]
pub struct StdoutNotifier;

impl StdoutNotifier {
    /// Creates a new `StdoutNotifier`.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn send(&self, payload: NotificationPayload) -> Result<(), NotificationError> {
        let kind = if payload.is_aggregated() { "aggregated" } else { "single" };
        let message = format_payload(&payload);

        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "=== {} ({}) ===\n{}\n", payload.error_type(), kind, message)?;
        stdout.flush()?;
        Ok(())
    }
}

/// A notifier that emits formatted messages as `tracing` events.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl LogNotifier {
    /// Creates a new `LogNotifier`.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, payload: NotificationPayload) -> Result<(), NotificationError> {
        tracing::warn!(
            error_type = %payload.error_type(),
            aggregated = payload.is_aggregated(),
            "{}",
            format_payload(&payload)
        );
        Ok(())
    }
}

/// A notifier that writes each payload to standard output as one JSON line.
///
/// The line is the serialized payload with the formatted operator text added
/// under `text`.
#[derive(Debug, Default, Clone)]
pub struct JsonNotifier;

impl JsonNotifier {
    /// Creates a new `JsonNotifier`.
    pub fn new() -> Self {
        Self
    }

    /// Renders `payload` as a single JSON line, without the trailing newline.
    pub fn render(&self, payload: &NotificationPayload) -> Result<String, NotificationError> {
        let mut value = payload.context()?;
        if let Some(object) = value.as_object_mut() {
            object.insert("text".to_string(), format_payload(payload).into());
        }
        Ok(serde_json::to_string(&value)?)
    }
}

#[async_trait]
impl Notifier for JsonNotifier {
    async fn send(&self, payload: NotificationPayload) -> Result<(), NotificationError> {
        let line = self.render(&payload)?;

        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        stdout.flush()?;
        Ok(())
    }
}
