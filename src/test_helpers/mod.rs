//! A set of helpers for testing

mod error_report;
mod notifier;

pub use error_report::ErrorReportBuilder;
pub use notifier::RecordingNotifier;
