//! Error types for the notification layer.

use thiserror::Error;

/// Defines the possible errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The delivery collaborator reported a failure.
    #[error("Notification failed: {0}")]
    NotifyFailed(String),

    /// The payload could not be serialized.
    #[error("Failed to serialize notification payload: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Writing the message to its output failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
