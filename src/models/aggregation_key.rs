//! Deduplication keys for error reports.

use std::fmt;

use serde::Serialize;

/// The bucket used for reports that carry no client id.
pub const GLOBAL_CLIENT: &str = "global";

/// The identity used to decide whether two reports are the same error.
///
/// Every component is lower-cased, trimmed, and has its internal whitespace
/// runs collapsed to a single `_`. Components are kept separate so that
/// distinct triples never compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AggregationKey {
    error_type: String,
    message: String,
    client: String,
}

impl AggregationKey {
    /// Derives the key for an error. A missing client falls back to the
    /// shared [`GLOBAL_CLIENT`] bucket.
    pub fn derive(error_type: &str, message: &str, client_id: Option<&str>) -> Self {
        Self {
            error_type: normalize(error_type),
            message: normalize(message),
            client: normalize(client_id.unwrap_or(GLOBAL_CLIENT)),
        }
    }

    /// The normalized client component.
    pub fn client(&self) -> &str {
        &self.client
    }
}

impl fmt::Display for AggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.error_type, self.message, self.client)
    }
}

/// Lower-cases `raw`, trims it and joins its whitespace-separated words with `_`.
pub(crate) fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}
