use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::models::ErrorReport;

/// A builder for creating `ErrorReport` instances for testing.
pub struct ErrorReportBuilder {
    error_type: String,
    message: String,
    client_id: Option<String>,
    context: Map<String, Value>,
    timestamp: Option<DateTime<Utc>>,
}

impl ErrorReportBuilder {
    /// Creates a new `ErrorReportBuilder` for the given error type.
    pub fn new(error_type: &str) -> Self {
        Self {
            error_type: error_type.to_string(),
            message: "conn refused".to_string(),
            client_id: None,
            context: Map::new(),
            timestamp: None,
        }
    }

    /// Sets the error message.
    pub fn message(mut self, message: &str) -> Self {
        self.message = message.to_string();
        self
    }

    /// Sets the client id.
    pub fn client(mut self, client_id: &str) -> Self {
        self.client_id = Some(client_id.to_string());
        self
    }

    /// Adds a context field.
    pub fn context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    /// Sets the report timestamp.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Builds the `ErrorReport`.
    pub fn build(self) -> ErrorReport {
        ErrorReport {
            error_type: self.error_type,
            message: self.message,
            client_id: self.client_id,
            context: self.context,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}
