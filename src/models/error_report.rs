//! This module defines the `ErrorReport` struct and the raw `ErrorDetails`
//! accepted from callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The raw details a caller attaches to an error notification.
///
/// Everything other than `error` and `timestamp` is kept as free-form context
/// and passed through to formatting untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// The error text. A missing value is treated as an empty string.
    #[serde(default)]
    pub error: String,

    /// When the error happened, if the caller knows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Additional context fields (client identifiers, endpoint, stack, ...).
    #[serde(flatten)]
    pub context: Map<String, Value>,
}

impl ErrorDetails {
    /// Creates details carrying only an error text.
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), ..Default::default() }
    }

    /// Adds a context field.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// A single occurrence of an error, as seen by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// The error category (e.g. `DBError`).
    pub error_type: String,

    /// The error text.
    pub message: String,

    /// The tenant or source the error belongs to, if known.
    pub client_id: Option<String>,

    /// Additional context fields.
    pub context: Map<String, Value>,

    /// When the error happened. Defaults to the time it was received.
    pub timestamp: DateTime<Utc>,
}

impl ErrorReport {
    /// Builds a report from raw caller details.
    ///
    /// The client id is taken from the first field in `client_id_fields` that
    /// holds a non-empty string (or number). A missing timestamp is filled in
    /// with `received_at`.
    pub fn from_details(
        error_type: &str,
        details: ErrorDetails,
        client_id_fields: &[String],
        received_at: DateTime<Utc>,
    ) -> Self {
        let client_id = client_id_fields
            .iter()
            .filter_map(|field| details.context.get(field))
            .find_map(scalar_to_string)
            .filter(|client| !client.is_empty());

        Self {
            error_type: error_type.to_string(),
            message: details.error,
            client_id,
            context: details.context,
            timestamp: details.timestamp.unwrap_or(received_at),
        }
    }

    /// Returns a context field rendered as a string, if it is a scalar.
    pub fn context_str(&self, field: &str) -> Option<String> {
        self.context.get(field).and_then(scalar_to_string)
    }
}

/// Renders strings, numbers and booleans as plain text.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
