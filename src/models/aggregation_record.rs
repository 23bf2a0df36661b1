//! This module defines the state collected for one open aggregation window.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    ErrorReport,
    aggregation_key::{GLOBAL_CLIENT, normalize},
};

/// Everything observed for one key since its window opened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationRecord {
    /// The error category, copied from the first occurrence.
    pub error_type: String,

    /// The number of occurrences since the window opened.
    pub count: usize,

    /// Processing time of the first occurrence.
    pub first_seen_at: DateTime<Utc>,

    /// Processing time of the most recent occurrence.
    pub last_seen_at: DateTime<Utc>,

    /// Every occurrence, in arrival order.
    pub occurrences: Vec<ErrorReport>,
}

impl AggregationRecord {
    /// Opens a record for the first occurrence of a key.
    pub fn open(report: ErrorReport, now: DateTime<Utc>) -> Self {
        Self {
            error_type: report.error_type.clone(),
            count: 1,
            first_seen_at: now,
            last_seen_at: now,
            occurrences: vec![report],
        }
    }

    /// Records a repeat occurrence.
    ///
    /// `now` is the processing time; the report's own timestamp is never used
    /// for window bookkeeping.
    pub fn record(&mut self, report: ErrorReport, now: DateTime<Utc>) {
        self.count += 1;
        self.last_seen_at = now;
        self.occurrences.push(report);
    }

    /// The message of the first occurrence.
    pub fn message(&self) -> &str {
        self.occurrences.first().map(|r| r.message.as_str()).unwrap_or_default()
    }

    /// The most recent occurrence.
    pub fn latest(&self) -> Option<&ErrorReport> {
        self.occurrences.last()
    }

    /// Occurrence counts per client. Reports without a client are counted
    /// under the shared `global` bucket.
    ///
    /// Clients are grouped the way keys compare them, so `L1` and `l1` count as
    /// one client, labelled with the spelling seen first.
    pub fn client_breakdown(&self) -> BTreeMap<String, usize> {
        let mut labels: HashMap<String, String> = HashMap::new();
        let mut clients = BTreeMap::new();
        for report in &self.occurrences {
            let client = report.client_id.as_deref().unwrap_or(GLOBAL_CLIENT);
            let label = labels.entry(normalize(client)).or_insert_with(|| client.to_string());
            *clients.entry(label.clone()).or_insert(0) += 1;
        }
        clients
    }
}
