//! # Notification
//!
//! This module is the boundary between the aggregator and whatever actually
//! delivers messages to the operator.
//!
//! ## Core Components
//!
//! - **`Notifier` Trait**: The delivery callback. The aggregator invokes it
//!   with a [`NotificationPayload`] and never inspects what happens next.
//! - **`AdminNotifier`**: The entry point for code that detects errors. It
//!   turns raw [`ErrorDetails`](crate::models::ErrorDetails) into reports and
//!   hands them to the aggregator.
//! - **Formatter**: Renders payloads as operator-facing text.
//! - **`StdoutNotifier` / `LogNotifier` / `JsonNotifier`**: Delivery
//!   collaborators that print the formatted text, emit it through `tracing`, or
//!   write one JSON line per payload.

mod admin;
pub mod error;
pub mod formatter;
mod payload;
mod stdout;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

pub use admin::AdminNotifier;
use error::NotificationError;
pub use payload::NotificationPayload;
pub use stdout::{JsonNotifier, LogNotifier, StdoutNotifier};

/// Delivers notifications produced by the aggregator.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends a single or aggregated notification.
    async fn send(&self, payload: NotificationPayload) -> Result<(), NotificationError>;
}
