//! The engine deduplicates error reports into time-bounded aggregation
//! windows and decides when the operator is notified.

pub mod aggregator;
pub mod store;

pub use aggregator::{AggregatorError, AggregatorStats, ErrorAggregator, ProcessOutcome};
