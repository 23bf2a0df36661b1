//! Feeds newline-delimited JSON notifications into an [`AdminNotifier`].

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

use crate::{models::ErrorDetails, notification::AdminNotifier};

/// One line of input.
#[derive(Debug, Deserialize)]
struct Notification {
    error_type: String,
    #[serde(default)]
    details: ErrorDetails,
}

/// What happened to the lines read by [`relay_lines`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelaySummary {
    /// Lines handed to the notifier.
    pub relayed: usize,
    /// Non-empty lines that could not be decoded.
    pub skipped: usize,
}

/// Reads notifications from `reader`, one JSON object per line, until the
/// input ends, reading fails, or `shutdown` is cancelled.
///
/// Lines that are not valid UTF-8 or not a valid notification are logged and
/// skipped. Blank lines are ignored.
pub async fn relay_lines<R>(
    mut reader: R,
    admin: &AdminNotifier,
    shutdown: CancellationToken,
) -> RelaySummary
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = RelaySummary::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Shutdown requested, no longer reading input.");
                break;
            }
            read = reader.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => {
                tracing::info!("Input closed, shutting down...");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Failed to read input, shutting down...");
                break;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Notification>(line) {
            Ok(notification) => {
                admin.notify(&notification.error_type, notification.details).await;
                summary.relayed += 1;
            }
            Err(e) => {
                tracing::warn!("Skipping malformed input line: {}", e);
                summary.skipped += 1;
            }
        }
    }

    summary
}
