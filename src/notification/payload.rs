use serde::Serialize;

use crate::models::{AggregationRecord, ErrorReport};

/// What the aggregator hands to a [`Notifier`](super::Notifier).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationPayload {
    /// The immediate notification for the first occurrence of an error.
    Single {
        /// The error category.
        error_type: String,
        /// The occurrence itself.
        report: ErrorReport,
    },
    /// The summary of a window that saw more than one occurrence.
    Aggregated(AggregationRecord),
}

impl NotificationPayload {
    /// The error category the payload is about.
    pub fn error_type(&self) -> &str {
        match self {
            NotificationPayload::Single { error_type, .. } => error_type,
            NotificationPayload::Aggregated(record) => &record.error_type,
        }
    }

    /// Whether this is a window summary rather than an immediate notification.
    pub fn is_aggregated(&self) -> bool {
        matches!(self, NotificationPayload::Aggregated(_))
    }

    /// Serializes the payload to a JSON value.
    pub fn context(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
