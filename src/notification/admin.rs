use std::sync::Arc;

use crate::{
    engine::{ErrorAggregator, ProcessOutcome},
    models::{ErrorDetails, ErrorReport},
};

/// The entry point for code that detects errors and wants the operator told.
///
/// Turns raw details into an [`ErrorReport`] (injecting a timestamp when the
/// caller gave none) and hands it to the aggregator. Never fails; delivery
/// problems are logged by the aggregator.
#[derive(Clone)]
pub struct AdminNotifier {
    aggregator: Arc<ErrorAggregator>,
    client_id_fields: Arc<[String]>,
}

impl AdminNotifier {
    /// Creates a new `AdminNotifier`. `client_id_fields` lists the context
    /// fields that identify a client, in order of preference.
    pub fn new(aggregator: Arc<ErrorAggregator>, client_id_fields: Vec<String>) -> Self {
        Self { aggregator, client_id_fields: client_id_fields.into() }
    }

    /// Reports an error of category `error_type`.
    #[tracing::instrument(level = "debug", skip(self, details))]
    pub async fn notify(&self, error_type: &str, details: ErrorDetails) -> ProcessOutcome {
        let report = ErrorReport::from_details(
            error_type,
            details,
            &self.client_id_fields,
            chrono::Utc::now(),
        );
        self.aggregator.process(report).await
    }

    /// The aggregator behind this notifier.
    pub fn aggregator(&self) -> &Arc<ErrorAggregator> {
        &self.aggregator
    }
}
